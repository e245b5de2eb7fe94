use axum::{extract::State, routing::get, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AppError,
    json::Json,
    profile::services::ProfileService,
    state::AppState,
    users::{ProfileUpdate, User},
};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).patch(update_profile))
}

#[instrument(skip(profiles))]
pub async fn get_profile(
    State(profiles): State<ProfileService>,
    AuthUser(user_id): AuthUser,
) -> Result<axum::Json<User>, AppError> {
    let user = profiles.get_profile(user_id).await?;
    Ok(axum::Json(user))
}

#[instrument(skip(profiles, payload))]
pub async fn update_profile(
    State(profiles): State<ProfileService>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<axum::Json<MessageResponse>, AppError> {
    profiles.update_profile(user_id, payload).await?;
    Ok(axum::Json(MessageResponse {
        message: "Profile updated successfully".into(),
    }))
}
