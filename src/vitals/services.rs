use axum::http::StatusCode;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{LogVitalRequest, LoggedReading};
use super::repo;
use super::repo_types::VitalReading;
use crate::alerts;
use crate::auth::repo_types::User;
use crate::engine::period::{day_of, day_range};
use crate::engine::thresholds::{evaluate_thresholds, validate_payload};
use crate::engine::EngineError;
use crate::error::rejected;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    #[error("recorded_at lies in the future")]
    FutureReading,
    #[error(transparent)]
    Rejected(#[from] EngineError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<VitalsError> for (StatusCode, String) {
    fn from(e: VitalsError) -> Self {
        match e {
            VitalsError::FutureReading => (StatusCode::BAD_REQUEST, e.to_string()),
            VitalsError::Rejected(e) => rejected(e),
            VitalsError::Internal(e) => crate::error::internal(e),
        }
    }
}

/// Validated reading in the user's offset, not yet stored.
pub fn reading_from_request(
    user_id: Uuid,
    req: LogVitalRequest,
    now: OffsetDateTime,
) -> Result<VitalReading, VitalsError> {
    validate_payload(&req.payload)?;
    let recorded_at = req.recorded_at.unwrap_or(now).to_offset(now.offset());
    if recorded_at > now {
        return Err(VitalsError::FutureReading);
    }
    Ok(VitalReading {
        id: Uuid::new_v4(),
        user_id,
        recorded_at,
        payload: req.payload,
    })
}

/// `[start, end)` of a local calendar day in `now`'s offset.
pub fn local_day_range(day: Date, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let start = day.midnight().assume_offset(now.offset());
    (start, start + Duration::days(1))
}

/// Stores the reading, then checks today's readings against the user's
/// thresholds and raises whatever alerts are due.
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn log_reading(
    state: &AppState,
    user: &User,
    req: LogVitalRequest,
    now: OffsetDateTime,
) -> Result<LoggedReading, VitalsError> {
    let reading = reading_from_request(user.id, req, now)?;
    let reading = repo::insert_reading(&state.db, &reading).await?;
    info!(reading_id = %reading.id, kind = reading.kind().as_str(), "vital reading logged");

    let (from, to) = day_range(now);
    let readings = repo::list_readings(&state.db, user.id, from, to).await?;
    let settings = alerts::repo::settings_or_default(&state.db, user.id).await?;
    let raised_today = alerts::repo::alerts_on_day(&state.db, user.id, day_of(now)).await?;

    let due = evaluate_thresholds(
        &readings,
        &settings,
        &raised_today,
        state.config.sugar_policy,
        &user.display_name,
        now,
    );
    let alerts =
        alerts::services::raise_alerts(&state.db, state.notifier.as_ref(), due, now).await?;

    Ok(LoggedReading { reading, alerts })
}
