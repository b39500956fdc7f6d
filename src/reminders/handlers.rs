use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{ReminderRequest, ReminderToday, ToggleResponse};
use super::repo;
use super::repo_types::Reminder;
use super::services;
use crate::auth::LocalUser;
use crate::engine::period::TimeOfDay;
use crate::error::{internal, not_found};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route("/reminders/today", get(today))
        .route("/reminders/:id", put(update_reminder).delete(delete_reminder))
        .route("/reminders/:id/toggle", post(toggle_slot))
}

#[instrument(skip(state, current))]
pub async fn list_reminders(
    State(state): State<AppState>,
    current: LocalUser,
) -> Result<Json<Vec<Reminder>>, (StatusCode, String)> {
    let reminders = repo::list_reminders(&state.db, current.id())
        .await
        .map_err(internal)?;
    Ok(Json(reminders))
}

#[instrument(skip(state, current, payload))]
pub async fn create_reminder(
    State(state): State<AppState>,
    current: LocalUser,
    Json(payload): Json<ReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>), (StatusCode, String)> {
    let reminder = services::create(&state.db, current.id(), payload, current.now).await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

#[instrument(skip(state, current, payload))]
pub async fn update_reminder(
    State(state): State<AppState>,
    current: LocalUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReminderRequest>,
) -> Result<Json<Reminder>, (StatusCode, String)> {
    let reminder = services::update(&state.db, current.id(), id, payload).await?;
    Ok(Json(reminder))
}

#[instrument(skip(state, current))]
pub async fn delete_reminder(
    State(state): State<AppState>,
    current: LocalUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !repo::delete_reminder(&state.db, current.id(), id)
        .await
        .map_err(internal)?
    {
        return Err(not_found("Reminder"));
    }
    info!(user_id = %current.id(), reminder_id = %id, "reminder deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, current))]
pub async fn today(
    State(state): State<AppState>,
    current: LocalUser,
) -> Result<Json<Vec<ReminderToday>>, (StatusCode, String)> {
    let view = services::today(&state.db, current.id(), current.now)
        .await
        .map_err(internal)?;
    Ok(Json(view))
}

#[instrument(skip(state, current))]
pub async fn toggle_slot(
    State(state): State<AppState>,
    current: LocalUser,
    Path(id): Path<Uuid>,
    Json(slot): Json<TimeOfDay>,
) -> Result<Json<ToggleResponse>, (StatusCode, String)> {
    let response = services::toggle(&state.db, current.id(), id, slot, current.now).await?;
    Ok(Json(response))
}
