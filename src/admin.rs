use axum::{
    extract::{Path, State},
    middleware,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{PublicUser, UserResponse},
        gate::{authenticate, require_admin},
    },
    errors::AppError,
    state::AppState,
};

/// Admin-only routes. `authenticate` runs first, then the role gate.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/users/:id", get(get_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.authentication.current_user(id).await?;
    Ok(Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}
