//! End-of-day cycle for one user, planned without side effects.

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::digest::{compose_medicine_digest, compose_reminder_digest};
use super::period::{day_of, period_window, PeriodKind};
use super::reconcile::materialize_missed;
use super::thresholds::{evaluate_thresholds, SugarThresholdPolicy};
use crate::alerts::repo_types::{Alert, AlertSettings};
use crate::medicines::repo_types::{DoseLogEvent, MedicineRecord};
use crate::reminders::repo_types::Reminder;
use crate::vitals::repo_types::VitalReading;

/// Everything the cycle reads for one user, loaded once.
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub patient_name: String,
    pub medicines: Vec<MedicineRecord>,
    pub reminders: Vec<Reminder>,
    pub readings: Vec<VitalReading>,
    pub settings: AlertSettings,
    pub alerts_today: Vec<Alert>,
}

/// Writes the cycle wants applied, in application order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyPlan {
    pub deactivated: Vec<Uuid>,
    pub missed_events: Vec<DoseLogEvent>,
    pub reset_reminders: Vec<Uuid>,
    pub alerts: Vec<Alert>,
}

impl DailyPlan {
    pub fn is_empty(&self) -> bool {
        self.deactivated.is_empty()
            && self.missed_events.is_empty()
            && self.reset_reminders.is_empty()
            && self.alerts.is_empty()
    }
}

/// Days whose missed doses a cycle at `now` records, oldest first. A dose due
/// after the last run of a day, or a day the job never ran on, is caught up
/// by the next cycle as long as it falls in this range.
pub fn catch_up_days(now: OffsetDateTime) -> Vec<Date> {
    period_window(PeriodKind::Weekly, now).days()
}

/// Plans the cycle and updates `snapshot` as if the plan had been applied,
/// so planning twice on the same snapshot yields an empty second plan.
/// Snapshot medicines must carry their events for [`catch_up_days`].
pub fn plan_daily_cycle(
    snapshot: &mut UserSnapshot,
    policy: SugarThresholdPolicy,
    now: OffsetDateTime,
) -> DailyPlan {
    let today = day_of(now);
    let days = catch_up_days(now);
    let mut plan = DailyPlan::default();

    for record in snapshot.medicines.iter_mut() {
        for day in &days {
            plan.missed_events
                .extend(materialize_missed(record, *day, now));
        }
        if record.medicine.has_expired(today) {
            record.medicine.is_active = false;
            plan.deactivated.push(record.medicine.id);
        }
    }

    for reminder in snapshot.reminders.iter_mut() {
        if reminder.reset_completed_times_if_needed(now) {
            plan.reset_reminders.push(reminder.id);
        }
    }

    let thresholds = evaluate_thresholds(
        &snapshot.readings,
        &snapshot.settings,
        &snapshot.alerts_today,
        policy,
        &snapshot.patient_name,
        now,
    );
    snapshot.alerts_today.extend(thresholds.iter().cloned());
    plan.alerts.extend(thresholds);

    let live: Vec<MedicineRecord> = snapshot
        .medicines
        .iter()
        .filter(|r| r.medicine.is_active_on(today))
        .cloned()
        .collect();
    let digests = [
        compose_medicine_digest(
            &live,
            &snapshot.settings,
            &snapshot.alerts_today,
            &snapshot.patient_name,
            now,
        ),
        compose_reminder_digest(
            &snapshot.reminders,
            &snapshot.settings,
            &snapshot.alerts_today,
            &snapshot.patient_name,
            now,
        ),
    ];
    for alert in digests.into_iter().flatten() {
        snapshot.alerts_today.push(alert.clone());
        plan.alerts.push(alert);
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::repo_types::{AlertCondition, AlertKind};
    use crate::engine::fixtures::{bp_reading, medicine_record, reminder, settings_with_contacts, DAY};
    use time::macros::{date, datetime};

    const NINE_PM: OffsetDateTime = datetime!(2026-03-10 21:00 UTC);

    fn snapshot() -> UserSnapshot {
        let mut current = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        current.medicine.start_date = DAY;
        let mut finished = medicine_record("Antibiotic", &[(8, 0)]);
        finished.medicine.start_date = date!(2026 - 03 - 09);
        finished.medicine.end_date = date!(2026 - 03 - 09);
        let mut checkup = reminder("Blood test", &[(9, 0)]);
        checkup.last_reset_date = Some(datetime!(2026-03-09 08:00 UTC));

        UserSnapshot {
            patient_name: "Sam".to_string(),
            medicines: vec![current, finished],
            reminders: vec![checkup],
            readings: vec![bp_reading(datetime!(2026-03-10 09:00 UTC), 150, 95)],
            settings: settings_with_contacts(),
            alerts_today: Vec::new(),
        }
    }

    #[test]
    fn plans_every_step_of_the_cycle() {
        let mut snap = snapshot();
        let expired = snap.medicines[1].medicine.id;
        let reminder_id = snap.reminders[0].id;

        let plan = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, NINE_PM);

        assert_eq!(plan.deactivated, vec![expired]);
        assert!(!snap.medicines[1].medicine.is_active);
        assert_eq!(plan.missed_events.len(), 3);
        assert!(plan.missed_events.iter().all(|e| !e.is_taken));
        let expired_days: Vec<_> = plan
            .missed_events
            .iter()
            .filter(|e| e.medicine_id == expired)
            .map(|e| e.day)
            .collect();
        assert_eq!(expired_days, vec![date!(2026 - 03 - 09)]);
        assert_eq!(plan.reset_reminders, vec![reminder_id]);

        let conditions: Vec<_> = plan.alerts.iter().map(|a| a.condition).collect();
        assert_eq!(
            conditions,
            vec![
                AlertCondition::BloodPressureOutOfRange,
                AlertCondition::MissedDoses,
                AlertCondition::MissedReminders,
            ]
        );
        assert_eq!(plan.alerts[1].kind, AlertKind::Report);
        assert!(!plan.alerts[1].content.contains("Antibiotic"));
    }

    #[test]
    fn second_run_on_same_day_plans_nothing() {
        let mut snap = snapshot();
        let first = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, NINE_PM);
        assert!(!first.is_empty());

        let later = datetime!(2026-03-10 22:30 UTC);
        let second = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, later);
        assert!(second.is_empty(), "unexpected plan: {second:?}");
    }

    #[test]
    fn no_contacts_still_materializes_but_raises_nothing() {
        let mut snap = snapshot();
        snap.settings.emergency_contacts.clear();

        let plan = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, NINE_PM);
        assert_eq!(plan.missed_events.len(), 3);
        assert!(plan.alerts.is_empty());
    }

    #[test]
    fn dose_due_after_the_last_run_is_recorded_next_day() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (23, 55)]);
        rec.medicine.start_date = DAY;
        let mut snap = snapshot();
        snap.medicines = vec![rec];

        let last_run = datetime!(2026-03-10 23:45 UTC);
        let first = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, last_run);
        assert_eq!(first.missed_events.len(), 1);

        let next_day = datetime!(2026-03-11 21:00 UTC);
        let second = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, next_day);
        let late: Vec<_> = second.missed_events.iter().filter(|e| e.day == DAY).collect();
        assert_eq!(late.len(), 1);

        let day_one = snap.medicines[0].events.iter().filter(|e| e.day == DAY).count();
        assert_eq!(day_one, 2);
    }

    #[test]
    fn skipped_days_inside_the_week_are_caught_up() {
        let mut snap = snapshot();
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        rec.medicine.start_date = date!(2026 - 03 - 01);
        snap.medicines = vec![rec];

        let plan = plan_daily_cycle(&mut snap, SugarThresholdPolicy::FastingOnly, NINE_PM);
        let days: Vec<_> = plan.missed_events.iter().map(|e| e.day).collect();
        assert_eq!(days, catch_up_days(NINE_PM));
        assert_eq!(days.first(), Some(&date!(2026 - 03 - 04)));
    }
}
