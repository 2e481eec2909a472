use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::{claims::Claims, extractors::verify_request, repo_types::Role};
use crate::{config::AuthConfig, errors::AppError, state::AppState};

/// Verifies the bearer token and attaches its `Claims` to the request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verify_request(req.headers(), &state)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin principals: role ADMIN, or the configured bootstrap-admin email.
pub fn is_admin(claims: &Claims, config: &AuthConfig) -> bool {
    claims.role == Role::Admin || config.is_bootstrap_admin(&claims.email)
}

/// Role gate for admin routes. Must run after [`authenticate`].
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(claims) = req.extensions().get::<Claims>() else {
        return Err(AppError::Unauthenticated {
            message: "Authentication required".into(),
        });
    };

    if !is_admin(claims, &state.config.auth) {
        warn!(
            target: "audit",
            event = "authorization_denied",
            user_id = %claims.sub,
            email = %claims.email,
            role = %claims.role,
            method = %req.method(),
            path = %req.uri().path(),
            "admin access denied"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}
