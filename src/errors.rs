use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{jwt::TokenError, password::PasswordError, store::StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    /// Field-level request validation failure
    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    /// Same message for unknown email and wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{message}")]
    Unauthenticated { message: String },

    #[error("An account with this email already exists")]
    Conflict { email: String },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Admin access required")]
    Forbidden,

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AppError::Conflict { .. } => StatusCode::BAD_REQUEST,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client. Internal detail only in debug builds.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Internal(e) if cfg!(debug_assertions) => {
                format!("Internal server error: {e:#}")
            }
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(email) => AppError::Conflict { email },
            StoreError::Database(e) => {
                AppError::Internal(anyhow::Error::new(e).context("credential store"))
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(e) => tracing::error!(error = ?e, "internal error"),
            AppError::Conflict { email } => tracing::warn!(%email, "conflict"),
            AppError::Forbidden | AppError::Unauthenticated { .. } | AppError::Token(_) => {
                tracing::info!(error = %self, "auth rejected")
            }
            _ => tracing::debug!(error = %self, "client error"),
        }

        let field = match &self {
            AppError::Validation { field, .. } => *field,
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.user_message(),
            field,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
