use axum::{extract::State, http::StatusCode, routing::post, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        services::AuthService,
    },
    error::AppError,
    json::Json,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, axum::Json<RegisterResponse>), AppError> {
    let user_id = auth
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        axum::Json(RegisterResponse {
            message: "User created successfully".into(),
            user_id,
        }),
    ))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> Result<axum::Json<LoginResponse>, AppError> {
    let outcome = auth.login(&payload.email, &payload.password).await?;
    Ok(axum::Json(LoginResponse {
        token: outcome.token,
        user: outcome.user.into(),
    }))
}
