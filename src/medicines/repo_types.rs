use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::engine::period::TimeOfDay;

/// Medicine row. `start_date..=end_date` is the treatment window.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Medicine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub purpose: Option<String>,
    pub is_active: bool,
    pub start_date: Date,
    pub end_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A time of day at which a dose is due on every active day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledDose {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub hour: i32,
    pub minute: i32,
}

impl ScheduledDose {
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::new(self.hour, self.minute)
    }
}

/// Outcome of one scheduled dose on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DoseLogEvent {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub scheduled_dose_id: Uuid,
    pub day: Date,
    pub is_taken: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// A medicine together with its doses and log events, as loaded for one
/// engine call. Collections are always present, possibly empty.
#[derive(Debug, Clone, Serialize)]
pub struct MedicineRecord {
    pub medicine: Medicine,
    pub doses: Vec<ScheduledDose>,
    pub events: Vec<DoseLogEvent>,
}

impl MedicineRecord {
    pub fn new(medicine: Medicine, doses: Vec<ScheduledDose>, events: Vec<DoseLogEvent>) -> Self {
        Self {
            medicine,
            doses,
            events,
        }
    }

    pub fn dose(&self, dose_id: Uuid) -> Option<&ScheduledDose> {
        self.doses.iter().find(|d| d.id == dose_id)
    }
}
