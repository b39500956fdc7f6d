use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::debug;
use uuid::Uuid;

use super::period::{combine, TimeOfDay};
use crate::medicines::repo_types::{Medicine, MedicineRecord};

/// A scheduled dose projected onto a concrete day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueDose {
    pub dose_id: Uuid,
    pub time: TimeOfDay,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
}

impl Medicine {
    /// Active flag set and `day` inside the inclusive treatment window.
    pub fn is_active_on(&self, day: Date) -> bool {
        self.is_active && self.start_date <= day && day <= self.end_date
    }

    /// Still flagged active although the window closed before `today`.
    pub fn has_expired(&self, today: Date) -> bool {
        self.is_active && self.end_date < today
    }
}

/// Every dose of the medicine projected onto `day`, ordered by time.
/// Doses whose time cannot be projected are left out.
pub fn doses_on(record: &MedicineRecord, day: Date, offset: UtcOffset) -> Vec<DueDose> {
    let mut out: Vec<DueDose> = record
        .doses
        .iter()
        .filter_map(|dose| {
            let time = dose.time_of_day();
            match combine(day, time, offset) {
                Some(scheduled_at) => Some(DueDose {
                    dose_id: dose.id,
                    time,
                    scheduled_at,
                }),
                None => {
                    debug!(dose_id = %dose.id, %time, "skipping dose with invalid time");
                    None
                }
            }
        })
        .collect();
    out.sort_by_key(|d| d.scheduled_at);
    out
}

/// Doses of `day` whose time is at or before `now`. Empty when the medicine
/// is not active on that day.
pub fn due_doses(record: &MedicineRecord, day: Date, now: OffsetDateTime) -> Vec<DueDose> {
    if !record.medicine.is_active_on(day) {
        return Vec::new();
    }
    doses_on(record, day, now.offset())
        .into_iter()
        .filter(|d| d.scheduled_at <= now)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{medicine_record, DAY};
    use time::macros::{date, datetime};

    #[test]
    fn only_past_or_equal_times_are_due() {
        let rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let due = due_doses(&rec, DAY, datetime!(2026-03-10 12:00 UTC));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].time, TimeOfDay::new(8, 0));

        let due = due_doses(&rec, DAY, datetime!(2026-03-10 20:00 UTC));
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn due_doses_are_ordered_by_time() {
        let rec = medicine_record("Atorvastatin", &[(21, 0), (7, 30), (13, 15)]);
        let due = due_doses(&rec, DAY, datetime!(2026-03-10 23:00 UTC));
        let times: Vec<_> = due.iter().map(|d| d.time).collect();
        assert_eq!(
            times,
            vec![TimeOfDay::new(7, 30), TimeOfDay::new(13, 15), TimeOfDay::new(21, 0)]
        );
    }

    #[test]
    fn future_medicine_has_nothing_due() {
        let mut rec = medicine_record("Lisinopril", &[(0, 0), (8, 0)]);
        rec.medicine.start_date = date!(2026 - 03 - 11);
        assert!(due_doses(&rec, DAY, datetime!(2026-03-10 23:59 UTC)).is_empty());
    }

    #[test]
    fn inactive_or_ended_medicine_has_nothing_due() {
        let mut rec = medicine_record("Amoxicillin", &[(8, 0)]);
        rec.medicine.is_active = false;
        assert!(due_doses(&rec, DAY, datetime!(2026-03-10 12:00 UTC)).is_empty());

        rec.medicine.is_active = true;
        rec.medicine.end_date = date!(2026 - 03 - 09);
        assert!(due_doses(&rec, DAY, datetime!(2026-03-10 12:00 UTC)).is_empty());
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let mut rec = medicine_record("Amoxicillin", &[(8, 0)]);
        rec.medicine.start_date = DAY;
        rec.medicine.end_date = DAY;
        assert_eq!(due_doses(&rec, DAY, datetime!(2026-03-10 12:00 UTC)).len(), 1);
    }

    #[test]
    fn malformed_times_are_skipped() {
        let rec = medicine_record("Metformin", &[(8, 0), (25, 0), (9, 75)]);
        let due = due_doses(&rec, DAY, datetime!(2026-03-10 23:00 UTC));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].time, TimeOfDay::new(8, 0));
    }

    #[test]
    fn expiry_is_detected_the_day_after_end() {
        let rec = medicine_record("Amoxicillin", &[(8, 0)]);
        assert!(!rec.medicine.has_expired(rec.medicine.end_date));
        assert!(rec.medicine.has_expired(date!(2026 - 12 - 31)));
    }
}
