use axum::http::StatusCode;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::dto::{ReminderRequest, ReminderToday, ToggleResponse};
use super::repo;
use super::repo_types::Reminder;
use crate::engine::period::TimeOfDay;
use crate::engine::EngineError;
use crate::error::rejected;

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Reminder not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Rejected(#[from] EngineError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ReminderError> for (StatusCode, String) {
    fn from(e: ReminderError) -> Self {
        match e {
            ReminderError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
            ReminderError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            ReminderError::Rejected(e) => rejected(e),
            ReminderError::Internal(e) => crate::error::internal(e),
        }
    }
}

pub fn validate_request(req: &ReminderRequest) -> Result<(), ReminderError> {
    if req.title.trim().is_empty() {
        return Err(ReminderError::Invalid("title must not be empty".into()));
    }
    if req.start_date > req.end_date {
        return Err(ReminderError::Invalid(
            "start_date must not be after end_date".into(),
        ));
    }
    if req.times.is_empty() {
        return Err(ReminderError::Invalid("at least one time is required".into()));
    }
    if let Some(t) = req.times.iter().find(|t| !t.is_valid()) {
        return Err(ReminderError::Invalid(format!("invalid time {t}")));
    }
    Ok(())
}

fn sorted_times(times: &[TimeOfDay]) -> Vec<TimeOfDay> {
    let mut out = times.to_vec();
    out.sort_by_key(|t| (t.hour, t.minute));
    out.dedup();
    out
}

/// Runs the once-a-day reset on each reminder. The stored reset is guarded,
/// so a reminder already reset today by another writer is reloaded instead
/// of overwritten.
pub async fn reset_if_needed(
    db: &PgPool,
    reminders: &mut [Reminder],
    now: OffsetDateTime,
) -> anyhow::Result<usize> {
    let mut reset = 0;
    for r in reminders.iter_mut() {
        if !r.reset_completed_times_if_needed(now) {
            continue;
        }
        if repo::reset_completions(db, r.id, now).await? {
            reset += 1;
        } else if let Some(fresh) = repo::get_reminder(db, r.user_id, r.id).await? {
            debug!(reminder_id = %r.id, "reminder already reset today, reloaded");
            *r = fresh;
        }
    }
    if reset > 0 {
        debug!(reset, "reminder completions reset for the day");
    }
    Ok(reset)
}

pub fn today_view(reminders: &[Reminder], now: OffsetDateTime) -> Vec<ReminderToday> {
    reminders
        .iter()
        .filter(|r| r.is_live(now))
        .map(|r| ReminderToday {
            reminder_id: r.id,
            title: r.title.clone(),
            kind: r.kind,
            slots: r.slot_states(now),
        })
        .collect()
}

#[instrument(skip(db))]
pub async fn today(
    db: &PgPool,
    user_id: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<Vec<ReminderToday>> {
    let mut reminders = repo::list_reminders(db, user_id).await?;
    reset_if_needed(db, &mut reminders, now).await?;
    Ok(today_view(&reminders, now))
}

#[instrument(skip(db, req))]
pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    req: ReminderRequest,
    now: OffsetDateTime,
) -> Result<Reminder, ReminderError> {
    validate_request(&req)?;
    let reminder = Reminder {
        id: Uuid::new_v4(),
        user_id,
        title: req.title.trim().to_string(),
        kind: req.kind,
        times: sorted_times(&req.times),
        start_date: req.start_date,
        end_date: req.end_date,
        is_active: req.is_active,
        completed_times: Vec::new(),
        last_reset_date: Some(now),
        created_at: now,
    };
    let saved = repo::insert_reminder(db, &reminder).await?;
    info!(user_id = %user_id, reminder_id = %saved.id, "reminder created");
    Ok(saved)
}

#[instrument(skip(db, req))]
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    reminder_id: Uuid,
    req: ReminderRequest,
) -> Result<Reminder, ReminderError> {
    validate_request(&req)?;
    let mut reminder = repo::get_reminder(db, user_id, reminder_id)
        .await?
        .ok_or(ReminderError::NotFound)?;
    reminder.title = req.title.trim().to_string();
    reminder.kind = req.kind;
    reminder.times = sorted_times(&req.times);
    reminder.start_date = req.start_date;
    reminder.end_date = req.end_date;
    reminder.is_active = req.is_active;
    repo::update_reminder(db, &reminder)
        .await?
        .ok_or(ReminderError::NotFound)
}

/// Completes or reopens one slot of today, after the daily reset.
#[instrument(skip(db))]
pub async fn toggle(
    db: &PgPool,
    user_id: Uuid,
    reminder_id: Uuid,
    time: TimeOfDay,
    now: OffsetDateTime,
) -> Result<ToggleResponse, ReminderError> {
    let mut reminder = repo::get_reminder(db, user_id, reminder_id)
        .await?
        .ok_or(ReminderError::NotFound)?;
    reminder.reset_completed_times_if_needed(now);
    let toggle = reminder.toggle_time_slot(time, now)?;
    repo::save_completions(db, &reminder).await?;
    debug!(reminder_id = %reminder_id, %time, ?toggle, "reminder slot toggled");
    Ok(ToggleResponse { toggle, reminder })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::reminder;
    use crate::engine::reminder::SlotState;
    use crate::reminders::repo_types::ReminderKind;
    use time::macros::{date, datetime};

    fn request(times: &[(i32, i32)]) -> ReminderRequest {
        ReminderRequest {
            title: "Blood test".into(),
            kind: ReminderKind::Checkup,
            times: times.iter().map(|&(h, m)| TimeOfDay::new(h, m)).collect(),
            start_date: date!(2026 - 03 - 01),
            end_date: date!(2026 - 03 - 31),
            is_active: true,
        }
    }

    #[test]
    fn request_validation() {
        assert!(validate_request(&request(&[(9, 0)])).is_ok());
        assert!(validate_request(&request(&[])).is_err());
        assert!(validate_request(&request(&[(9, 75)])).is_err());
        let mut blank = request(&[(9, 0)]);
        blank.title = "  ".into();
        assert!(matches!(validate_request(&blank), Err(ReminderError::Invalid(_))));
    }

    #[test]
    fn times_are_sorted_and_unique() {
        let times = sorted_times(&[
            TimeOfDay::new(18, 0),
            TimeOfDay::new(9, 30),
            TimeOfDay::new(18, 0),
        ]);
        assert_eq!(times, vec![TimeOfDay::new(9, 30), TimeOfDay::new(18, 0)]);
    }

    #[test]
    fn today_view_skips_reminders_out_of_period() {
        let live = reminder("Blood test", &[(9, 0), (18, 0)]);
        let mut ended = reminder("Dentist", &[(10, 0)]);
        ended.end_date = date!(2026 - 03 - 01);

        let view = today_view(&[live, ended], datetime!(2026-03-10 12:00 UTC));
        assert_eq!(view.len(), 1);
        let states: Vec<_> = view[0].slots.iter().map(|s| s.state).collect();
        assert_eq!(states, vec![SlotState::Overdue, SlotState::Pending]);
    }

    #[test]
    fn engine_rejection_maps_to_status() {
        let (status, _): (StatusCode, String) =
            ReminderError::Rejected(EngineError::ReminderInactive(Uuid::new_v4())).into();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _): (StatusCode, String) = ReminderError::NotFound.into();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
