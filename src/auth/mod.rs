use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod services;

pub use jwt::{AuthUser, JwtKeys};
pub use services::AuthService;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
