use std::collections::HashSet;

use anyhow::Context;
use axum::http::StatusCode;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::dto::{MedicineDetails, MedicineRequest, MedicineToday, TodayResponse};
use super::repo;
use super::repo_types::{DoseLogEvent, Medicine, MedicineRecord, ScheduledDose};
use crate::engine::adherence::{adherence_report, daily_adherence, AdherenceReport};
use crate::engine::period::{day_of, period_window, PeriodKind, TimeOfDay};
use crate::engine::reconcile::{
    day_schedule, mark_missed, mark_taken, materialize_missed, toggle_taken, DoseLogChange,
};
use crate::engine::EngineError;
use crate::error::rejected;

#[derive(Debug, thiserror::Error)]
pub enum MedicineError {
    #[error("Medicine not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Rejected(#[from] EngineError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<MedicineError> for (StatusCode, String) {
    fn from(e: MedicineError) -> Self {
        match e {
            MedicineError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
            MedicineError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            MedicineError::Rejected(e) => rejected(e),
            MedicineError::Internal(e) => crate::error::internal(e),
        }
    }
}

pub fn validate_request(req: &MedicineRequest) -> Result<(), MedicineError> {
    let invalid = |msg: &str| Err(MedicineError::Invalid(msg.to_string()));
    if req.name.trim().is_empty() {
        return invalid("name must not be empty");
    }
    if req.dosage.trim().is_empty() {
        return invalid("dosage must not be empty");
    }
    if req.start_date > req.end_date {
        return invalid("start_date must not be after end_date");
    }
    if req.times.is_empty() {
        return invalid("at least one dose time is required");
    }
    if let Some(t) = req.times.iter().find(|t| !t.is_valid()) {
        return Err(MedicineError::Invalid(format!("invalid dose time {t}")));
    }
    let distinct: HashSet<TimeOfDay> = req.times.iter().copied().collect();
    if distinct.len() != req.times.len() {
        return invalid("dose times must be distinct");
    }
    Ok(())
}

/// Doses to drop and doses to add so the schedule matches `wanted`. Doses
/// whose time is kept retain their id and history.
pub fn plan_dose_changes(
    medicine_id: Uuid,
    existing: &[ScheduledDose],
    wanted: &[TimeOfDay],
) -> (Vec<Uuid>, Vec<ScheduledDose>) {
    let removed = existing
        .iter()
        .filter(|d| !wanted.contains(&d.time_of_day()))
        .map(|d| d.id)
        .collect();
    let added = wanted
        .iter()
        .filter(|t| !existing.iter().any(|d| d.time_of_day() == **t))
        .map(|t| ScheduledDose {
            id: Uuid::new_v4(),
            medicine_id,
            hour: t.hour,
            minute: t.minute,
        })
        .collect();
    (removed, added)
}

fn medicine_from_request(id: Uuid, user_id: Uuid, req: &MedicineRequest, now: OffsetDateTime) -> Medicine {
    Medicine {
        id,
        user_id,
        name: req.name.trim().to_string(),
        dosage: req.dosage.trim().to_string(),
        purpose: req
            .purpose
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        is_active: req.is_active,
        start_date: req.start_date,
        end_date: req.end_date,
        created_at: now,
    }
}

pub async fn list(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<MedicineDetails>> {
    let medicines = repo::list_medicines(db, user_id).await?;
    let ids: Vec<Uuid> = medicines.iter().map(|m| m.id).collect();
    let doses = if ids.is_empty() {
        Vec::new()
    } else {
        repo::list_doses(db, &ids).await?
    };
    Ok(repo::assemble_records(medicines, doses, Vec::new())
        .into_iter()
        .map(MedicineDetails::from)
        .collect())
}

/// The medicine with its doses and the events of `from..=to`.
pub async fn load_record(
    db: &PgPool,
    user_id: Uuid,
    medicine_id: Uuid,
    from: Date,
    to: Date,
) -> Result<MedicineRecord, MedicineError> {
    let medicine = repo::get_medicine(db, user_id, medicine_id)
        .await?
        .ok_or(MedicineError::NotFound)?;
    repo::load_records(db, vec![medicine], from, to)
        .await?
        .pop()
        .ok_or(MedicineError::NotFound)
}

pub async fn details(
    db: &PgPool,
    user_id: Uuid,
    medicine_id: Uuid,
    now: OffsetDateTime,
) -> Result<MedicineDetails, MedicineError> {
    let today = day_of(now);
    Ok(load_record(db, user_id, medicine_id, today, today).await?.into())
}

#[instrument(skip(db, req))]
pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    req: MedicineRequest,
    now: OffsetDateTime,
) -> Result<MedicineDetails, MedicineError> {
    validate_request(&req)?;
    let medicine = medicine_from_request(Uuid::new_v4(), user_id, &req, now);
    let (_, doses) = plan_dose_changes(medicine.id, &[], &req.times);

    let mut tx = db.begin().await.context("begin tx")?;
    let medicine = repo::insert_medicine_tx(&mut tx, &medicine).await?;
    for dose in &doses {
        repo::insert_dose_tx(&mut tx, dose).await?;
    }
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user_id, medicine_id = %medicine.id, doses = doses.len(), "medicine created");
    Ok(MedicineDetails { medicine, doses })
}

#[instrument(skip(db, req))]
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    medicine_id: Uuid,
    req: MedicineRequest,
    now: OffsetDateTime,
) -> Result<MedicineDetails, MedicineError> {
    validate_request(&req)?;
    let today = day_of(now);
    let current = load_record(db, user_id, medicine_id, today, today).await?;
    let mut medicine = medicine_from_request(medicine_id, user_id, &req, now);
    medicine.created_at = current.medicine.created_at;
    let (removed, added) = plan_dose_changes(medicine_id, &current.doses, &req.times);

    let mut tx = db.begin().await.context("begin tx")?;
    let medicine = repo::update_medicine_tx(&mut tx, &medicine).await?;
    repo::delete_doses_tx(&mut tx, &removed).await?;
    for dose in &added {
        repo::insert_dose_tx(&mut tx, dose).await?;
    }
    tx.commit().await.context("commit tx")?;

    let mut doses: Vec<ScheduledDose> = current
        .doses
        .into_iter()
        .filter(|d| !removed.contains(&d.id))
        .chain(added)
        .collect();
    doses.sort_by_key(|d| (d.hour, d.minute));
    info!(user_id = %user_id, medicine_id = %medicine_id, removed = removed.len(), "medicine updated");
    Ok(MedicineDetails { medicine, doses })
}

/// Writes what an engine command changed and returns it with the stored row.
pub async fn persist_change(db: &PgPool, change: DoseLogChange) -> anyhow::Result<DoseLogChange> {
    match &change {
        DoseLogChange::Inserted(e) | DoseLogChange::Updated(e) => {
            let stored = repo::upsert_event(db, e).await?;
            Ok(change.with_event(stored))
        }
        DoseLogChange::Removed(e) => {
            repo::delete_event(db, e.scheduled_dose_id, e.day).await?;
            Ok(change)
        }
        DoseLogChange::Unchanged(_) => Ok(change),
    }
}

#[instrument(skip(db))]
pub async fn mark(
    db: &PgPool,
    user_id: Uuid,
    medicine_id: Uuid,
    dose_id: Uuid,
    day: Date,
    taken: bool,
    now: OffsetDateTime,
) -> Result<DoseLogChange, MedicineError> {
    let mut record = load_record(db, user_id, medicine_id, day, day).await?;
    let change = if taken {
        mark_taken(&mut record, dose_id, day, now)?
    } else {
        mark_missed(&mut record, dose_id, day, now)?
    };
    let change = persist_change(db, change).await?;
    debug!(event_id = %change.event().id, %day, taken, "dose marked");
    Ok(change)
}

#[instrument(skip(db))]
pub async fn toggle(
    db: &PgPool,
    user_id: Uuid,
    medicine_id: Uuid,
    dose_id: Uuid,
    day: Date,
    now: OffsetDateTime,
) -> Result<DoseLogChange, MedicineError> {
    let mut record = load_record(db, user_id, medicine_id, day, day).await?;
    let change = toggle_taken(&mut record, dose_id, day, now)?;
    let change = persist_change(db, change).await?;
    debug!(event_id = %change.event().id, %day, "dose toggled");
    Ok(change)
}

/// Records a not-taken event for every due dose of `day` that has none.
#[instrument(skip(db))]
pub async fn materialize(
    db: &PgPool,
    user_id: Uuid,
    day: Date,
    now: OffsetDateTime,
) -> Result<Vec<DoseLogEvent>, MedicineError> {
    if day > day_of(now) {
        return Err(EngineError::FutureDay(day).into());
    }
    let mut records = repo::load_user_records(db, user_id, day, day).await?;
    let planned: Vec<DoseLogEvent> = records
        .iter_mut()
        .flat_map(|r| materialize_missed(r, day, now))
        .collect();
    let written = repo::insert_missed_events(db, &planned).await?;
    info!(user_id = %user_id, %day, planned = planned.len(), written = written.len(), "missed doses materialized");
    Ok(written)
}

pub fn today_view(records: &[MedicineRecord], now: OffsetDateTime) -> TodayResponse {
    let today = day_of(now);
    let medicines = records
        .iter()
        .filter(|r| r.medicine.is_active_on(today))
        .map(|r| MedicineToday {
            medicine_id: r.medicine.id,
            name: r.medicine.name.clone(),
            dosage: r.medicine.dosage.clone(),
            doses: day_schedule(r, today, now),
        })
        .collect();
    TodayResponse {
        day: today,
        adherence: daily_adherence(records, now),
        medicines,
    }
}

pub async fn today(db: &PgPool, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<TodayResponse> {
    let today = day_of(now);
    let records = repo::load_user_records(db, user_id, today, today).await?;
    Ok(today_view(&records, now))
}

/// Medicines relevant to a window: active on one of its days, or with
/// events inside it.
pub fn relevant_to_window(records: Vec<MedicineRecord>, days: &[Date]) -> Vec<MedicineRecord> {
    records
        .into_iter()
        .filter(|r| !r.events.is_empty() || days.iter().any(|d| r.medicine.is_active_on(*d)))
        .collect()
}

pub async fn adherence(
    db: &PgPool,
    user_id: Uuid,
    kind: PeriodKind,
    now: OffsetDateTime,
) -> anyhow::Result<AdherenceReport> {
    let window = period_window(kind, now);
    let records =
        repo::load_user_records(db, user_id, window.first_day(), window.last_day()).await?;
    let records = relevant_to_window(records, &window.days());
    Ok(adherence_report(&records, kind, now))
}
