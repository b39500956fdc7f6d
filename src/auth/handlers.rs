use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{
    AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
    UpdateProfileRequest,
};
use super::extractors::LocalUser;
use super::jwt::JwtKeys;
use super::repo_types::User;
use super::services::{self, issue_tokens, AuthError};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let user = services::register(&state.db, payload).await?;
    let keys = JwtKeys::from_ref(&state);
    Ok((StatusCode::CREATED, Json(issue_tokens(&keys, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = services::login(&state.db, &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(AuthError::from)?
        .ok_or(AuthError::UnknownUser)?;
    info!(user_id = %user.id, "tokens refreshed");
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(current))]
pub async fn get_me(current: LocalUser) -> Json<PublicUser> {
    Json(current.user.into())
}

#[instrument(skip(state, current, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    current: LocalUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = services::update_profile(&state.db, current.user, payload).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}
