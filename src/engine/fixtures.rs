//! Shared builders for engine tests.

use time::macros::{date, datetime};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::period::TimeOfDay;
use crate::alerts::repo_types::AlertSettings;
use crate::medicines::repo_types::{Medicine, MedicineRecord, ScheduledDose};
use crate::reminders::repo_types::{Reminder, ReminderKind};
use crate::vitals::repo_types::{SugarTiming, VitalPayload, VitalReading};

pub const DAY: Date = date!(2026 - 03 - 10);

pub fn user_id() -> Uuid {
    Uuid::from_u128(0x5eed)
}

pub fn medicine_record(name: &str, times: &[(i32, i32)]) -> MedicineRecord {
    let medicine_id = Uuid::new_v4();
    let doses = times
        .iter()
        .map(|&(hour, minute)| ScheduledDose {
            id: Uuid::new_v4(),
            medicine_id,
            hour,
            minute,
        })
        .collect();
    MedicineRecord::new(
        Medicine {
            id: medicine_id,
            user_id: user_id(),
            name: name.to_string(),
            dosage: "500mg".to_string(),
            purpose: None,
            is_active: true,
            start_date: date!(2026 - 03 - 01),
            end_date: date!(2026 - 03 - 31),
            created_at: datetime!(2026-03-01 09:00 UTC),
        },
        doses,
        Vec::new(),
    )
}

pub fn reminder(title: &str, times: &[(i32, i32)]) -> Reminder {
    Reminder {
        id: Uuid::new_v4(),
        user_id: user_id(),
        title: title.to_string(),
        kind: ReminderKind::Checkup,
        times: times.iter().map(|&(h, m)| TimeOfDay::new(h, m)).collect(),
        start_date: date!(2026 - 03 - 01),
        end_date: date!(2026 - 03 - 31),
        is_active: true,
        completed_times: Vec::new(),
        last_reset_date: None,
        created_at: datetime!(2026-03-01 09:00 UTC),
    }
}

pub fn bp_reading(at: OffsetDateTime, systolic: i32, diastolic: i32) -> VitalReading {
    VitalReading {
        id: Uuid::new_v4(),
        user_id: user_id(),
        recorded_at: at,
        payload: VitalPayload::BloodPressure {
            systolic,
            diastolic,
        },
    }
}

pub fn sugar_reading(at: OffsetDateTime, level: f64, timing: SugarTiming) -> VitalReading {
    VitalReading {
        id: Uuid::new_v4(),
        user_id: user_id(),
        recorded_at: at,
        payload: VitalPayload::Sugar { level, timing },
    }
}

pub fn settings_with_contacts() -> AlertSettings {
    AlertSettings {
        emergency_contacts: vec!["carer@example.com".to_string(), "gp@example.com".to_string()],
        ..AlertSettings::defaults(user_id())
    }
}
