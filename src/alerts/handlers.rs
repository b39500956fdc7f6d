use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AlertSettingsRequest, Pagination};
use super::repo;
use super::repo_types::{Alert, AlertSettings};
use super::services::settings_from_request;
use crate::auth::AuthUser;
use crate::error::{bad_request, internal};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alert-settings", get(get_settings).put(put_settings))
}

#[instrument(skip(state))]
pub async fn list_alerts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Alert>>, (StatusCode, String)> {
    let limit = p.limit.clamp(1, 200);
    let alerts = repo::list_alerts(&state.db, user_id, limit, p.offset.max(0))
        .await
        .map_err(internal)?;
    Ok(Json(alerts))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AlertSettings>, (StatusCode, String)> {
    let settings = repo::settings_or_default(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(settings))
}

#[instrument(skip(state, payload))]
pub async fn put_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AlertSettingsRequest>,
) -> Result<Json<AlertSettings>, (StatusCode, String)> {
    let settings = settings_from_request(user_id, payload).map_err(bad_request)?;
    let saved = repo::upsert_settings(&state.db, &settings)
        .await
        .map_err(internal)?;
    info!(user_id = %user_id, contacts = saved.emergency_contacts.len(), "alert settings updated");
    Ok(Json(saved))
}
