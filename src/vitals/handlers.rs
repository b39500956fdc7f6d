use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{LogVitalRequest, LoggedReading, VitalsQuery};
use super::repo;
use super::repo_types::VitalReading;
use super::services;
use crate::auth::LocalUser;
use crate::engine::period::day_of;
use crate::error::internal;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/vitals", get(list_vitals).post(log_vital))
}

#[instrument(skip(state, current))]
pub async fn list_vitals(
    State(state): State<AppState>,
    current: LocalUser,
    Query(query): Query<VitalsQuery>,
) -> Result<Json<Vec<VitalReading>>, (StatusCode, String)> {
    let day = query.day.unwrap_or_else(|| day_of(current.now));
    let (from, to) = services::local_day_range(day, current.now);
    let readings = repo::list_readings(&state.db, current.id(), from, to)
        .await
        .map_err(internal)?;
    Ok(Json(readings))
}

#[instrument(skip(state, current, payload))]
pub async fn log_vital(
    State(state): State<AppState>,
    current: LocalUser,
    Json(payload): Json<LogVitalRequest>,
) -> Result<(StatusCode, Json<LoggedReading>), (StatusCode, String)> {
    let logged = services::log_reading(&state, &current.user, payload, current.now).await?;
    Ok((StatusCode::CREATED, Json(logged)))
}
