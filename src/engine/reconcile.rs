//! Cross-references due doses with dose log events.
//!
//! Reading ([`reconcile`], [`day_schedule`]) never writes. Writes are explicit
//! commands ([`materialize_missed`], [`mark_dose`], [`toggle_taken`]) that
//! update the in-memory record and return exactly what the persistence layer
//! has to apply.

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::error::EngineError;
use super::period::{day_of, TimeOfDay};
use super::schedule::{doses_on, due_doses, DueDose};
use crate::medicines::repo_types::{DoseLogEvent, MedicineRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseState {
    Taken,
    Missed,
    /// Due, time has passed, nothing logged yet.
    MissedUnrecorded,
    /// Not due yet and nothing logged.
    Upcoming,
}

impl DoseState {
    pub fn is_missed(self) -> bool {
        matches!(self, DoseState::Missed | DoseState::MissedUnrecorded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledDose {
    pub dose_id: Uuid,
    pub time: TimeOfDay,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub state: DoseState,
    pub event_id: Option<Uuid>,
}

/// What a command did to the dose log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", content = "event", rename_all = "snake_case")]
pub enum DoseLogChange {
    Inserted(DoseLogEvent),
    Updated(DoseLogEvent),
    Removed(DoseLogEvent),
    Unchanged(DoseLogEvent),
}

impl DoseLogChange {
    pub fn event(&self) -> &DoseLogEvent {
        match self {
            DoseLogChange::Inserted(e)
            | DoseLogChange::Updated(e)
            | DoseLogChange::Removed(e)
            | DoseLogChange::Unchanged(e) => e,
        }
    }

    /// Same kind of change, carrying `event` instead, e.g. the row storage
    /// kept after resolving a conflict.
    pub fn with_event(self, event: DoseLogEvent) -> Self {
        match self {
            DoseLogChange::Inserted(_) => DoseLogChange::Inserted(event),
            DoseLogChange::Updated(_) => DoseLogChange::Updated(event),
            DoseLogChange::Removed(_) => DoseLogChange::Removed(event),
            DoseLogChange::Unchanged(_) => DoseLogChange::Unchanged(event),
        }
    }
}

pub fn find_event(events: &[DoseLogEvent], dose_id: Uuid, day: Date) -> Option<&DoseLogEvent> {
    events
        .iter()
        .find(|e| e.scheduled_dose_id == dose_id && e.day == day)
}

fn classify(dose: &DueDose, event: Option<&DoseLogEvent>, due: bool) -> ReconciledDose {
    let state = match event {
        Some(e) if e.is_taken => DoseState::Taken,
        Some(_) => DoseState::Missed,
        None if due => DoseState::MissedUnrecorded,
        None => DoseState::Upcoming,
    };
    ReconciledDose {
        dose_id: dose.dose_id,
        time: dose.time,
        scheduled_at: dose.scheduled_at,
        state,
        event_id: event.map(|e| e.id),
    }
}

/// Classifies each due dose of `day` against the logged events.
pub fn reconcile(due: &[DueDose], events: &[DoseLogEvent], day: Date) -> Vec<ReconciledDose> {
    due.iter()
        .map(|d| classify(d, find_event(events, d.dose_id, day), true))
        .collect()
}

/// Every dose of `day` with its state, including the ones not due yet.
pub fn day_schedule(record: &MedicineRecord, day: Date, now: OffsetDateTime) -> Vec<ReconciledDose> {
    if !record.medicine.is_active_on(day) {
        return Vec::new();
    }
    doses_on(record, day, now.offset())
        .iter()
        .map(|d| {
            let due = d.scheduled_at <= now;
            classify(d, find_event(&record.events, d.dose_id, day), due)
        })
        .collect()
}

/// Records a not-taken event for every due dose of `day` that has none.
/// Returns only the events it created, so a second call for the same day is
/// a no-op.
pub fn materialize_missed(
    record: &mut MedicineRecord,
    day: Date,
    now: OffsetDateTime,
) -> Vec<DoseLogEvent> {
    let mut created = Vec::new();
    for due in due_doses(record, day, now) {
        if find_event(&record.events, due.dose_id, day).is_some() {
            continue;
        }
        let event = DoseLogEvent {
            id: Uuid::new_v4(),
            medicine_id: record.medicine.id,
            scheduled_dose_id: due.dose_id,
            day,
            is_taken: false,
            recorded_at: now,
        };
        record.events.push(event.clone());
        created.push(event);
    }
    created
}

fn check_markable(
    record: &MedicineRecord,
    dose_id: Uuid,
    day: Date,
    now: OffsetDateTime,
) -> Result<(), EngineError> {
    if record.dose(dose_id).is_none() {
        return Err(EngineError::UnknownDose {
            medicine_id: record.medicine.id,
            dose_id,
        });
    }
    if day > day_of(now) {
        return Err(EngineError::FutureDay(day));
    }
    if !record.medicine.is_active_on(day) {
        return Err(EngineError::InactiveOnDay(record.medicine.id, day));
    }
    Ok(())
}

/// Upserts the outcome for `(dose, day)`. An existing event is flipped in
/// place, never duplicated.
pub fn mark_dose(
    record: &mut MedicineRecord,
    dose_id: Uuid,
    day: Date,
    taken: bool,
    now: OffsetDateTime,
) -> Result<DoseLogChange, EngineError> {
    check_markable(record, dose_id, day, now)?;

    let existing = record
        .events
        .iter_mut()
        .find(|e| e.scheduled_dose_id == dose_id && e.day == day);
    if let Some(event) = existing {
        if event.is_taken == taken {
            return Ok(DoseLogChange::Unchanged(event.clone()));
        }
        event.is_taken = taken;
        event.recorded_at = now;
        return Ok(DoseLogChange::Updated(event.clone()));
    }

    let event = DoseLogEvent {
        id: Uuid::new_v4(),
        medicine_id: record.medicine.id,
        scheduled_dose_id: dose_id,
        day,
        is_taken: taken,
        recorded_at: now,
    };
    record.events.push(event.clone());
    Ok(DoseLogChange::Inserted(event))
}

pub fn mark_taken(
    record: &mut MedicineRecord,
    dose_id: Uuid,
    day: Date,
    now: OffsetDateTime,
) -> Result<DoseLogChange, EngineError> {
    mark_dose(record, dose_id, day, true, now)
}

pub fn mark_missed(
    record: &mut MedicineRecord,
    dose_id: Uuid,
    day: Date,
    now: OffsetDateTime,
) -> Result<DoseLogChange, EngineError> {
    mark_dose(record, dose_id, day, false, now)
}

/// The "taken" checkbox: taken becomes unlogged, missed or unlogged becomes
/// taken.
pub fn toggle_taken(
    record: &mut MedicineRecord,
    dose_id: Uuid,
    day: Date,
    now: OffsetDateTime,
) -> Result<DoseLogChange, EngineError> {
    check_markable(record, dose_id, day, now)?;

    let position = record
        .events
        .iter()
        .position(|e| e.scheduled_dose_id == dose_id && e.day == day);
    match position {
        Some(i) if record.events[i].is_taken => {
            Ok(DoseLogChange::Removed(record.events.remove(i)))
        }
        _ => mark_dose(record, dose_id, day, true, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{medicine_record, DAY};
    use time::macros::{date, datetime};

    const NINE_PM: OffsetDateTime = datetime!(2026-03-10 21:00 UTC);

    #[test]
    fn unlogged_due_doses_are_missed_unrecorded() {
        let rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let due = due_doses(&rec, DAY, NINE_PM);
        let states: Vec<_> = reconcile(&due, &rec.events, DAY)
            .into_iter()
            .map(|r| r.state)
            .collect();
        assert_eq!(states, vec![DoseState::MissedUnrecorded; 2]);
    }

    #[test]
    fn logged_events_drive_state() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let morning = rec.doses[0].id;
        let evening = rec.doses[1].id;
        mark_taken(&mut rec, morning, DAY, NINE_PM).unwrap();
        mark_missed(&mut rec, evening, DAY, NINE_PM).unwrap();

        let due = due_doses(&rec, DAY, NINE_PM);
        let out = reconcile(&due, &rec.events, DAY);
        assert_eq!(out[0].state, DoseState::Taken);
        assert_eq!(out[1].state, DoseState::Missed);
        assert!(out.iter().all(|r| r.event_id.is_some()));
    }

    #[test]
    fn events_from_other_days_do_not_count() {
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        let dose = rec.doses[0].id;
        mark_taken(&mut rec, dose, date!(2026 - 03 - 09), NINE_PM).unwrap();

        let due = due_doses(&rec, DAY, NINE_PM);
        assert_eq!(reconcile(&due, &rec.events, DAY)[0].state, DoseState::MissedUnrecorded);
    }

    #[test]
    fn day_schedule_reports_upcoming_doses() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let evening = rec.doses[1].id;
        let noon = datetime!(2026-03-10 12:00 UTC);
        mark_taken(&mut rec, evening, DAY, noon).unwrap();

        let schedule = day_schedule(&rec, DAY, noon);
        assert_eq!(schedule[0].state, DoseState::MissedUnrecorded);
        // taken early is still taken
        assert_eq!(schedule[1].state, DoseState::Taken);

        let fresh = medicine_record("Aspirin", &[(20, 0)]);
        assert_eq!(day_schedule(&fresh, DAY, noon)[0].state, DoseState::Upcoming);
    }

    #[test]
    fn materialize_is_idempotent() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let first = materialize_missed(&mut rec, DAY, NINE_PM);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|e| !e.is_taken && e.day == DAY));

        let second = materialize_missed(&mut rec, DAY, NINE_PM);
        assert!(second.is_empty());
        assert_eq!(rec.events.len(), 2);
    }

    #[test]
    fn materialize_skips_doses_already_logged_and_not_yet_due() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (12, 0), (20, 0)]);
        let morning = rec.doses[0].id;
        let now = datetime!(2026-03-10 13:00 UTC);
        mark_taken(&mut rec, morning, DAY, now).unwrap();

        let created = materialize_missed(&mut rec, DAY, now);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].scheduled_dose_id, rec.doses[1].id);
    }

    #[test]
    fn marking_twice_flips_instead_of_inserting() {
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        let dose = rec.doses[0].id;

        assert!(matches!(
            mark_missed(&mut rec, dose, DAY, NINE_PM).unwrap(),
            DoseLogChange::Inserted(_)
        ));
        assert!(matches!(
            mark_missed(&mut rec, dose, DAY, NINE_PM).unwrap(),
            DoseLogChange::Unchanged(_)
        ));
        let change = mark_taken(&mut rec, dose, DAY, NINE_PM).unwrap();
        assert!(matches!(change, DoseLogChange::Updated(ref e) if e.is_taken));
        assert_eq!(rec.events.len(), 1);
    }

    #[test]
    fn toggle_cycles_taken_and_unlogged() {
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        let dose = rec.doses[0].id;

        let on = toggle_taken(&mut rec, dose, DAY, NINE_PM).unwrap();
        assert!(matches!(on, DoseLogChange::Inserted(ref e) if e.is_taken));
        let off = toggle_taken(&mut rec, dose, DAY, NINE_PM).unwrap();
        assert!(matches!(off, DoseLogChange::Removed(_)));
        assert!(rec.events.is_empty());

        materialize_missed(&mut rec, DAY, NINE_PM);
        let flipped = toggle_taken(&mut rec, dose, DAY, NINE_PM).unwrap();
        assert!(matches!(flipped, DoseLogChange::Updated(ref e) if e.is_taken));
        assert_eq!(rec.events.len(), 1);
    }

    #[test]
    fn marking_rejects_foreign_doses_and_future_days() {
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        let other = medicine_record("Aspirin", &[(8, 0)]);
        let foreign = other.doses[0].id;

        assert!(matches!(
            mark_taken(&mut rec, foreign, DAY, NINE_PM),
            Err(EngineError::UnknownDose { .. })
        ));
        let dose = rec.doses[0].id;
        assert_eq!(
            mark_taken(&mut rec, dose, date!(2026 - 03 - 11), NINE_PM),
            Err(EngineError::FutureDay(date!(2026 - 03 - 11)))
        );
        assert!(matches!(
            mark_taken(&mut rec, dose, date!(2026 - 02 - 27), NINE_PM),
            Err(EngineError::InactiveOnDay(..))
        ));
    }

    #[test]
    fn change_keeps_its_kind_when_given_the_stored_row() {
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        let dose = rec.doses[0].id;
        let planned = mark_taken(&mut rec, dose, DAY, NINE_PM).unwrap();

        let stored = DoseLogEvent {
            id: Uuid::new_v4(),
            recorded_at: datetime!(2026-03-10 08:05 UTC),
            ..planned.event().clone()
        };
        let change = planned.with_event(stored.clone());
        assert!(matches!(change, DoseLogChange::Inserted(_)));
        assert_eq!(change.event(), &stored);
    }
}
