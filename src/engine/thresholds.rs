//! Emergency alerts for out-of-range vital readings.
//!
//! Only the latest reading of each kind today is considered. An alert is
//! raised at most once per user, condition and day: the check is done against
//! the structured [`AlertKey`] of the alerts already raised, and the same key
//! backs a unique index in storage for concurrent callers.

use std::str::FromStr;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use super::error::EngineError;
use super::period::day_of;
use crate::alerts::repo_types::{Alert, AlertCondition, AlertKey, AlertKind, AlertSettings};
use crate::vitals::repo_types::{SugarTiming, VitalKind, VitalPayload, VitalReading};

pub const BP_SUBJECT: &str = "Emergency Alert: BP Out of Range";
pub const SUGAR_SUBJECT: &str = "Emergency Alert: Sugar Out of Range";

/// Which sugar range a reading is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SugarThresholdPolicy {
    /// Fasting range for every reading, matching the behaviour users know.
    #[default]
    FastingOnly,
    /// Fasting or after-meal range depending on the reading.
    ByTiming,
}

impl FromStr for SugarThresholdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fasting" | "fasting_only" => Ok(SugarThresholdPolicy::FastingOnly),
            "by_timing" | "timing" => Ok(SugarThresholdPolicy::ByTiming),
            other => Err(format!("unknown sugar threshold mode `{other}`")),
        }
    }
}

pub fn sugar_range(
    settings: &AlertSettings,
    timing: SugarTiming,
    policy: SugarThresholdPolicy,
) -> (f64, f64) {
    match (policy, timing) {
        (SugarThresholdPolicy::ByTiming, SugarTiming::AfterMeal) => {
            (settings.after_meal_sugar_min, settings.after_meal_sugar_max)
        }
        _ => (settings.fasting_sugar_min, settings.fasting_sugar_max),
    }
}

pub fn validate_payload(payload: &VitalPayload) -> Result<(), EngineError> {
    match *payload {
        VitalPayload::BloodPressure {
            systolic,
            diastolic,
        } => {
            if systolic <= 0 || diastolic <= 0 {
                return Err(EngineError::InvalidReading(
                    "blood pressure values must be positive".into(),
                ));
            }
            if diastolic >= systolic {
                return Err(EngineError::InvalidReading(
                    "diastolic must be lower than systolic".into(),
                ));
            }
        }
        VitalPayload::Sugar { level, .. } => {
            if !level.is_finite() || level <= 0.0 {
                return Err(EngineError::InvalidReading(
                    "sugar level must be a positive number".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Most recent reading of `kind` taken on `now`'s calendar day.
pub fn latest_today(
    readings: &[VitalReading],
    kind: VitalKind,
    now: OffsetDateTime,
) -> Option<&VitalReading> {
    let today = day_of(now);
    readings
        .iter()
        .filter(|r| r.kind() == kind && day_of(r.recorded_at.to_offset(now.offset())) == today)
        .max_by_key(|r| r.recorded_at)
}

fn already_raised(raised: &[Alert], key: &AlertKey) -> bool {
    raised.iter().any(|a| a.key() == *key)
}

fn reading_time(reading: &VitalReading, now: OffsetDateTime) -> String {
    let local = reading.recorded_at.to_offset(now.offset());
    format!("{} {:02}:{:02}", local.date(), local.hour(), local.minute())
}

fn emergency_body(patient: &str, reading_line: &str, range_line: &str, at: &str) -> String {
    format!(
        "EMERGENCY HEALTH ALERT\n\
         \n\
         Patient: {patient}\n\
         Reading: {reading_line}\n\
         Safe range: {range_line}\n\
         Recorded at: {at}\n\
         \n\
         Recommended actions:\n\
         - Contact {patient} now and check how they are feeling.\n\
         - If there is chest pain, confusion, fainting or shortness of breath, call emergency services.\n\
         - Ask for a repeat measurement after five minutes of rest.\n"
    )
}

fn bp_alert(
    reading: &VitalReading,
    settings: &AlertSettings,
    patient: &str,
    now: OffsetDateTime,
) -> Option<Alert> {
    let VitalPayload::BloodPressure {
        systolic,
        diastolic,
    } = reading.payload
    else {
        return None;
    };
    let systolic_ok = (settings.bp_min_systolic..=settings.bp_max_systolic).contains(&systolic);
    let diastolic_ok = (settings.bp_min_diastolic..=settings.bp_max_diastolic).contains(&diastolic);
    if systolic_ok && diastolic_ok {
        return None;
    }
    let key = AlertKey {
        user_id: settings.user_id,
        kind: AlertKind::Emergency,
        condition: AlertCondition::BloodPressureOutOfRange,
        day: day_of(now),
    };
    let body = emergency_body(
        patient,
        &format!("Blood pressure {systolic}/{diastolic} mmHg"),
        &format!(
            "{}-{} / {}-{} mmHg",
            settings.bp_min_systolic,
            settings.bp_max_systolic,
            settings.bp_min_diastolic,
            settings.bp_max_diastolic
        ),
        &reading_time(reading, now),
    );
    Some(Alert::compose(
        key,
        settings.emergency_contacts.clone(),
        BP_SUBJECT.to_string(),
        body,
        now,
    ))
}

fn sugar_alert(
    reading: &VitalReading,
    settings: &AlertSettings,
    policy: SugarThresholdPolicy,
    patient: &str,
    now: OffsetDateTime,
) -> Option<Alert> {
    let VitalPayload::Sugar { level, timing } = reading.payload else {
        return None;
    };
    let (min, max) = sugar_range(settings, timing, policy);
    if (min..=max).contains(&level) {
        return None;
    }
    let key = AlertKey {
        user_id: settings.user_id,
        kind: AlertKind::Emergency,
        condition: AlertCondition::SugarOutOfRange,
        day: day_of(now),
    };
    let timing_label = match timing {
        SugarTiming::Fasting => "fasting",
        SugarTiming::AfterMeal => "after meal",
    };
    let body = emergency_body(
        patient,
        &format!("Blood sugar {level:.0} mg/dL ({timing_label})"),
        &format!("{min:.0}-{max:.0} mg/dL"),
        &reading_time(reading, now),
    );
    Some(Alert::compose(
        key,
        settings.emergency_contacts.clone(),
        SUGAR_SUBJECT.to_string(),
        body,
        now,
    ))
}

/// New emergency alerts warranted by today's readings. Safe to call any
/// number of times a day: conditions present in `raised_today` are skipped.
pub fn evaluate_thresholds(
    readings: &[VitalReading],
    settings: &AlertSettings,
    raised_today: &[Alert],
    policy: SugarThresholdPolicy,
    patient: &str,
    now: OffsetDateTime,
) -> Vec<Alert> {
    if settings.emergency_contacts.is_empty() {
        debug!(user_id = %settings.user_id, "no emergency contacts, skipping threshold check");
        return Vec::new();
    }

    let candidates = [
        latest_today(readings, VitalKind::BloodPressure, now)
            .and_then(|r| bp_alert(r, settings, patient, now)),
        latest_today(readings, VitalKind::Sugar, now)
            .and_then(|r| sugar_alert(r, settings, policy, patient, now)),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter(|alert| !already_raised(raised_today, &alert.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{bp_reading, settings_with_contacts, sugar_reading};
    use time::macros::datetime;

    const NOON: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

    #[test]
    fn high_bp_raises_one_emergency_alert() {
        let settings = settings_with_contacts();
        let readings = vec![bp_reading(datetime!(2026-03-10 09:00 UTC), 150, 95)];

        let alerts = evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::FastingOnly,
            "Sam",
            NOON,
        );
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.kind, AlertKind::Emergency);
        assert!(alert.subject.contains("BP Out of Range"));
        assert!(alert.content.contains("150/95"));
        assert!(alert.content.contains("Patient: Sam"));
        assert!(alert.content.contains("2026-03-10 09:00"));
        assert_eq!(alert.recipients_line(), "carer@example.com, gp@example.com");
    }

    #[test]
    fn repeated_evaluation_does_not_duplicate() {
        let settings = settings_with_contacts();
        let readings = vec![
            bp_reading(datetime!(2026-03-10 09:00 UTC), 150, 95),
            sugar_reading(datetime!(2026-03-10 08:00 UTC), 180.0, SugarTiming::Fasting),
        ];

        let mut raised = Vec::new();
        for _ in 0..5 {
            let new = evaluate_thresholds(
                &readings,
                &settings,
                &raised,
                SugarThresholdPolicy::FastingOnly,
                "Sam",
                NOON,
            );
            raised.extend(new);
        }
        assert_eq!(raised.len(), 2);
        assert_eq!(
            raised.iter().filter(|a| a.condition == AlertCondition::SugarOutOfRange).count(),
            1
        );
    }

    #[test]
    fn only_latest_reading_counts() {
        let settings = settings_with_contacts();
        let readings = vec![
            bp_reading(datetime!(2026-03-10 07:00 UTC), 170, 100),
            bp_reading(datetime!(2026-03-10 11:00 UTC), 115, 75),
        ];
        let alerts = evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::FastingOnly,
            "Sam",
            NOON,
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn readings_from_other_days_are_ignored() {
        let settings = settings_with_contacts();
        let readings = vec![bp_reading(datetime!(2026-03-09 23:00 UTC), 190, 110)];
        assert!(evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::FastingOnly,
            "Sam",
            NOON
        )
        .is_empty());
    }

    #[test]
    fn low_diastolic_alone_triggers() {
        let settings = settings_with_contacts();
        let readings = vec![bp_reading(datetime!(2026-03-10 09:00 UTC), 110, 50)];
        let alerts = evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::FastingOnly,
            "Sam",
            NOON,
        );
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn no_contacts_means_no_alert() {
        let mut settings = settings_with_contacts();
        settings.emergency_contacts.clear();
        let readings = vec![bp_reading(datetime!(2026-03-10 09:00 UTC), 200, 120)];
        assert!(evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::FastingOnly,
            "Sam",
            NOON
        )
        .is_empty());
    }

    #[test]
    fn after_meal_reading_depends_on_policy() {
        let settings = settings_with_contacts();
        let readings = vec![sugar_reading(
            datetime!(2026-03-10 10:00 UTC),
            130.0,
            SugarTiming::AfterMeal,
        )];

        let fasting = evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::FastingOnly,
            "Sam",
            NOON,
        );
        assert_eq!(fasting.len(), 1);
        assert_eq!(fasting[0].subject, SUGAR_SUBJECT);

        let by_timing = evaluate_thresholds(
            &readings,
            &settings,
            &[],
            SugarThresholdPolicy::ByTiming,
            "Sam",
            NOON,
        );
        assert!(by_timing.is_empty());
    }

    #[test]
    fn payload_validation() {
        assert!(validate_payload(&VitalPayload::BloodPressure {
            systolic: 120,
            diastolic: 80
        })
        .is_ok());
        assert!(validate_payload(&VitalPayload::BloodPressure {
            systolic: 80,
            diastolic: 120
        })
        .is_err());
        assert!(validate_payload(&VitalPayload::Sugar {
            level: f64::NAN,
            timing: SugarTiming::Fasting
        })
        .is_err());
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("fasting".parse::<SugarThresholdPolicy>(), Ok(SugarThresholdPolicy::FastingOnly));
        assert_eq!("BY_TIMING".parse::<SugarThresholdPolicy>(), Ok(SugarThresholdPolicy::ByTiming));
        assert!("random".parse::<SugarThresholdPolicy>().is_err());
    }
}
