use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::repo_types::{Medicine, MedicineRecord, ScheduledDose};
use crate::engine::adherence::Adherence;
use crate::engine::period::{PeriodKind, TimeOfDay};
use crate::engine::reconcile::ReconciledDose;

/// Body of create and update; `times` replaces the dose schedule.
#[derive(Debug, Deserialize)]
pub struct MedicineRequest {
    pub name: String,
    pub dosage: String,
    #[serde(default)]
    pub purpose: Option<String>,
    pub start_date: Date,
    pub end_date: Date,
    pub times: Vec<TimeOfDay>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct MedicineDetails {
    #[serde(flatten)]
    pub medicine: Medicine,
    pub doses: Vec<ScheduledDose>,
}

impl From<MedicineRecord> for MedicineDetails {
    fn from(r: MedicineRecord) -> Self {
        Self {
            medicine: r.medicine,
            doses: r.doses,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkDoseRequest {
    pub taken: bool,
    #[serde(default)]
    pub day: Option<Date>,
}

/// Body of toggle and materialize; the day defaults to today.
#[derive(Debug, Default, Deserialize)]
pub struct DayRequest {
    #[serde(default)]
    pub day: Option<Date>,
}

#[derive(Debug, Serialize)]
pub struct MedicineToday {
    pub medicine_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub doses: Vec<ReconciledDose>,
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub day: Date,
    pub adherence: Adherence,
    pub medicines: Vec<MedicineToday>,
}

#[derive(Debug, Deserialize)]
pub struct AdherenceQuery {
    #[serde(default = "default_period")]
    pub period: PeriodKind,
}

fn default_period() -> PeriodKind {
    PeriodKind::Daily
}
