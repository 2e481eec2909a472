use crate::state::AppState;
use axum::Router;

pub mod authentication;
pub mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod notifier;
pub mod password;
pub mod password_reset;
pub mod registration;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod store;


pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
