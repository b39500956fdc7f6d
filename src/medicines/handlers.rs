use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    AdherenceQuery, DayRequest, MarkDoseRequest, MedicineDetails, MedicineRequest, TodayResponse,
};
use super::repo;
use super::repo_types::DoseLogEvent;
use super::services;
use crate::auth::LocalUser;
use crate::engine::adherence::AdherenceReport;
use crate::engine::period::day_of;
use crate::engine::reconcile::DoseLogChange;
use crate::error::{internal, not_found};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/medicines", get(list_medicines).post(create_medicine))
        .route("/medicines/today", get(today))
        .route("/medicines/materialize", post(materialize))
        .route(
            "/medicines/:id",
            get(get_medicine).put(update_medicine).delete(delete_medicine),
        )
        .route("/medicines/:id/doses/:dose_id/mark", post(mark_dose))
        .route("/medicines/:id/doses/:dose_id/toggle", post(toggle_dose))
        .route("/adherence", get(adherence))
}

#[instrument(skip(state, current))]
pub async fn list_medicines(
    State(state): State<AppState>,
    current: LocalUser,
) -> Result<Json<Vec<MedicineDetails>>, (StatusCode, String)> {
    let items = services::list(&state.db, current.id())
        .await
        .map_err(internal)?;
    Ok(Json(items))
}

#[instrument(skip(state, current, payload))]
pub async fn create_medicine(
    State(state): State<AppState>,
    current: LocalUser,
    Json(payload): Json<MedicineRequest>,
) -> Result<(StatusCode, HeaderMap, Json<MedicineDetails>), (StatusCode, String)> {
    let created = services::create(&state.db, current.id(), payload, current.now).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/medicines/{}", created.medicine.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(created)))
}

#[instrument(skip(state, current))]
pub async fn get_medicine(
    State(state): State<AppState>,
    current: LocalUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicineDetails>, (StatusCode, String)> {
    let details = services::details(&state.db, current.id(), id, current.now).await?;
    Ok(Json(details))
}

#[instrument(skip(state, current, payload))]
pub async fn update_medicine(
    State(state): State<AppState>,
    current: LocalUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MedicineRequest>,
) -> Result<Json<MedicineDetails>, (StatusCode, String)> {
    let details = services::update(&state.db, current.id(), id, payload, current.now).await?;
    Ok(Json(details))
}

#[instrument(skip(state, current))]
pub async fn delete_medicine(
    State(state): State<AppState>,
    current: LocalUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !repo::delete_medicine(&state.db, current.id(), id)
        .await
        .map_err(internal)?
    {
        return Err(not_found("Medicine"));
    }
    info!(user_id = %current.id(), medicine_id = %id, "medicine deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, current))]
pub async fn today(
    State(state): State<AppState>,
    current: LocalUser,
) -> Result<Json<TodayResponse>, (StatusCode, String)> {
    let view = services::today(&state.db, current.id(), current.now)
        .await
        .map_err(internal)?;
    Ok(Json(view))
}

#[instrument(skip(state, current, payload))]
pub async fn mark_dose(
    State(state): State<AppState>,
    current: LocalUser,
    Path((id, dose_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MarkDoseRequest>,
) -> Result<Json<DoseLogChange>, (StatusCode, String)> {
    let day = payload.day.unwrap_or_else(|| day_of(current.now));
    let change = services::mark(
        &state.db,
        current.id(),
        id,
        dose_id,
        day,
        payload.taken,
        current.now,
    )
    .await?;
    Ok(Json(change))
}

#[instrument(skip(state, current, payload))]
pub async fn toggle_dose(
    State(state): State<AppState>,
    current: LocalUser,
    Path((id, dose_id)): Path<(Uuid, Uuid)>,
    payload: Option<Json<DayRequest>>,
) -> Result<Json<DoseLogChange>, (StatusCode, String)> {
    let day = payload
        .and_then(|Json(p)| p.day)
        .unwrap_or_else(|| day_of(current.now));
    let change = services::toggle(&state.db, current.id(), id, dose_id, day, current.now).await?;
    Ok(Json(change))
}

#[instrument(skip(state, current, payload))]
pub async fn materialize(
    State(state): State<AppState>,
    current: LocalUser,
    payload: Option<Json<DayRequest>>,
) -> Result<Json<Vec<DoseLogEvent>>, (StatusCode, String)> {
    let day = payload
        .and_then(|Json(p)| p.day)
        .unwrap_or_else(|| day_of(current.now));
    let created = services::materialize(&state.db, current.id(), day, current.now)
        .await?;
    Ok(Json(created))
}

#[instrument(skip(state, current))]
pub async fn adherence(
    State(state): State<AppState>,
    current: LocalUser,
    Query(q): Query<AdherenceQuery>,
) -> Result<Json<AdherenceReport>, (StatusCode, String)> {
    let report = services::adherence(&state.db, current.id(), q.period, current.now)
        .await
        .map_err(internal)?;
    Ok(Json(report))
}
