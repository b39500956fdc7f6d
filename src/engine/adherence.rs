//! Adherence over a period.
//!
//! Today's figure and its single-day series are computed from due doses;
//! weekly and monthly figures count recorded events only, relying on
//! materialization having written a record for every past due dose. An empty
//! denominator reports `N/A` overall but `0%` in the per-day series.

use std::fmt;

use serde::{Serialize, Serializer};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::period::{day_of, period_window, PeriodKind, PeriodWindow};
use super::reconcile::{reconcile, DoseState};
use super::schedule::due_doses;
use crate::medicines::repo_types::{DoseLogEvent, MedicineRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adherence {
    Percent(u8),
    NotAvailable,
}

impl Adherence {
    pub fn from_counts(taken: usize, total: usize) -> Self {
        if total == 0 {
            Adherence::NotAvailable
        } else {
            Adherence::Percent(ratio_percent(taken, total))
        }
    }
}

impl fmt::Display for Adherence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adherence::Percent(p) => write!(f, "{p}%"),
            Adherence::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Adherence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn ratio_percent(taken: usize, total: usize) -> u8 {
    let ratio = taken.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    taken: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, taken: bool) {
        self.total += 1;
        if taken {
            self.taken += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAdherence {
    pub day: Date,
    pub taken: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicineAdherence {
    pub medicine_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub taken: usize,
    pub missed: usize,
    pub adherence: Adherence,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdherenceReport {
    pub window: PeriodWindow,
    pub overall: Adherence,
    pub days: Vec<DayAdherence>,
    pub medicines: Vec<MedicineAdherence>,
}

fn today_tally(record: &MedicineRecord, now: OffsetDateTime) -> Tally {
    let today = day_of(now);
    let due = due_doses(record, today, now);
    let mut tally = Tally::default();
    for r in reconcile(&due, &record.events, today) {
        tally.add(r.state == DoseState::Taken);
    }
    tally
}

fn recorded_tally<'a>(events: impl Iterator<Item = &'a DoseLogEvent>, window: &PeriodWindow) -> Tally {
    let mut tally = Tally::default();
    for e in events.filter(|e| window.contains_day(e.day)) {
        tally.add(e.is_taken);
    }
    tally
}

/// Due doses across all active medicines today, taken over due.
pub fn daily_adherence(records: &[MedicineRecord], now: OffsetDateTime) -> Adherence {
    let mut taken = 0;
    let mut total = 0;
    for record in records {
        let t = today_tally(record, now);
        taken += t.taken;
        total += t.total;
    }
    Adherence::from_counts(taken, total)
}

/// Recorded events inside the window, taken over recorded.
pub fn recorded_adherence(records: &[MedicineRecord], window: &PeriodWindow) -> Adherence {
    let t = recorded_tally(records.iter().flat_map(|r| r.events.iter()), window);
    Adherence::from_counts(t.taken, t.total)
}

pub fn adherence(records: &[MedicineRecord], kind: PeriodKind, now: OffsetDateTime) -> Adherence {
    match kind {
        PeriodKind::Daily => daily_adherence(records, now),
        PeriodKind::Weekly | PeriodKind::Monthly => {
            recorded_adherence(records, &period_window(kind, now))
        }
    }
}

/// One entry per day of the window from recorded events. Days without any
/// record report 0%.
pub fn daily_series(records: &[MedicineRecord], window: &PeriodWindow) -> Vec<DayAdherence> {
    window
        .days()
        .into_iter()
        .map(|day| {
            let mut tally = Tally::default();
            for e in records.iter().flat_map(|r| r.events.iter()).filter(|e| e.day == day) {
                tally.add(e.is_taken);
            }
            DayAdherence::from_tally(day, tally)
        })
        .collect()
}

impl DayAdherence {
    fn from_tally(day: Date, tally: Tally) -> Self {
        Self {
            day,
            taken: tally.taken,
            total: tally.total,
            percent: if tally.total == 0 {
                0
            } else {
                ratio_percent(tally.taken, tally.total)
            },
        }
    }
}

/// Today's single entry, counted from due doses like the daily figure.
fn today_series(records: &[MedicineRecord], now: OffsetDateTime) -> Vec<DayAdherence> {
    let mut tally = Tally::default();
    for t in records.iter().map(|r| today_tally(r, now)) {
        tally.taken += t.taken;
        tally.total += t.total;
    }
    vec![DayAdherence::from_tally(day_of(now), tally)]
}

pub fn medicine_summaries(
    records: &[MedicineRecord],
    kind: PeriodKind,
    now: OffsetDateTime,
) -> Vec<MedicineAdherence> {
    let window = period_window(kind, now);
    records
        .iter()
        .map(|record| {
            let tally = match kind {
                PeriodKind::Daily => today_tally(record, now),
                _ => recorded_tally(record.events.iter(), &window),
            };
            MedicineAdherence {
                medicine_id: record.medicine.id,
                name: record.medicine.name.clone(),
                dosage: record.medicine.dosage.clone(),
                taken: tally.taken,
                missed: tally.total - tally.taken,
                adherence: Adherence::from_counts(tally.taken, tally.total),
            }
        })
        .collect()
}

pub fn adherence_report(
    records: &[MedicineRecord],
    kind: PeriodKind,
    now: OffsetDateTime,
) -> AdherenceReport {
    let window = period_window(kind, now);
    AdherenceReport {
        window,
        overall: adherence(records, kind, now),
        days: match kind {
            PeriodKind::Daily => today_series(records, now),
            PeriodKind::Weekly | PeriodKind::Monthly => daily_series(records, &window),
        },
        medicines: medicine_summaries(records, kind, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{medicine_record, DAY};
    use crate::engine::reconcile::{mark_dose, mark_taken, materialize_missed};
    use time::macros::{date, datetime};

    const NINE_PM: OffsetDateTime = datetime!(2026-03-10 21:00 UTC);

    #[test]
    fn missed_day_is_zero_not_na() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let due = due_doses(&rec, DAY, NINE_PM);
        assert_eq!(due.len(), 2);

        let created = materialize_missed(&mut rec, DAY, NINE_PM);
        assert_eq!(created.len(), 2);
        let records = vec![rec];
        let daily = daily_adherence(&records, NINE_PM);
        assert_eq!(daily, Adherence::Percent(0));
        assert_eq!(daily.to_string(), "0%");
    }

    #[test]
    fn nothing_due_is_not_available() {
        let records = vec![medicine_record("Metformin", &[(20, 0)])];
        let morning = datetime!(2026-03-10 07:00 UTC);
        assert_eq!(daily_adherence(&records, morning), Adherence::NotAvailable);
        assert_eq!(adherence(&[], PeriodKind::Weekly, morning).to_string(), "N/A");
    }

    #[test]
    fn daily_rounds_to_whole_percent() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (12, 0), (20, 0)]);
        let first = rec.doses[0].id;
        mark_taken(&mut rec, first, DAY, NINE_PM).unwrap();
        assert_eq!(daily_adherence(&[rec], NINE_PM), Adherence::Percent(33));
    }

    #[test]
    fn adherence_stays_within_bounds() {
        for taken in 0..=7 {
            let Adherence::Percent(p) = Adherence::from_counts(taken, 7) else {
                panic!("seven doses cannot be N/A");
            };
            assert!(p <= 100);
        }
        assert_eq!(Adherence::from_counts(7, 7), Adherence::Percent(100));
    }

    #[test]
    fn weekly_counts_recorded_events_only() {
        let mut rec = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        rec.medicine.start_date = DAY;
        let morning = rec.doses[0].id;
        mark_taken(&mut rec, morning, DAY, NINE_PM).unwrap();
        materialize_missed(&mut rec, DAY, NINE_PM);

        let records = vec![rec];
        let window = period_window(PeriodKind::Weekly, NINE_PM);
        let series = daily_series(&records, &window);
        assert_eq!(series.len(), 7);
        assert!(series[..6].iter().all(|d| d.percent == 0 && d.total == 0));
        assert_eq!(series[6].day, DAY);
        assert_eq!(series[6].percent, 50);

        assert_eq!(adherence(&records, PeriodKind::Weekly, NINE_PM), Adherence::Percent(50));
    }

    #[test]
    fn monthly_window_excludes_older_events() {
        let mut rec = medicine_record("Metformin", &[(8, 0)]);
        rec.medicine.start_date = date!(2026 - 01 - 01);
        let dose = rec.doses[0].id;
        mark_dose(&mut rec, dose, date!(2026 - 02 - 08), true, NINE_PM).unwrap();
        mark_dose(&mut rec, dose, date!(2026 - 02 - 09), false, NINE_PM).unwrap();
        mark_dose(&mut rec, dose, date!(2026 - 03 - 01), true, NINE_PM).unwrap();

        let records = vec![rec];
        // window starts 2026-02-09
        assert_eq!(adherence(&records, PeriodKind::Monthly, NINE_PM), Adherence::Percent(50));
    }

    #[test]
    fn report_has_per_medicine_breakdown() {
        let mut a = medicine_record("Metformin", &[(8, 0)]);
        let b = medicine_record("Aspirin", &[(9, 0)]);
        let dose = a.doses[0].id;
        mark_taken(&mut a, dose, DAY, NINE_PM).unwrap();

        let report = adherence_report(&[a, b], PeriodKind::Daily, NINE_PM);
        assert_eq!(report.overall, Adherence::Percent(50));
        assert_eq!(report.medicines.len(), 2);
        assert_eq!(report.medicines[0].adherence, Adherence::Percent(100));
        assert_eq!(report.medicines[1].missed, 1);
        assert_eq!(report.days.len(), 1);
        assert_eq!(report.days[0].day, DAY);
        assert_eq!((report.days[0].taken, report.days[0].total), (1, 2));
        assert_eq!(report.days[0].percent, 50);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"], "50%");
    }
}
