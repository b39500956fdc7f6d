use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::repo_types::{VitalPayload, VitalReading};
use crate::alerts::repo_types::Alert;

/// `{"kind": "sugar", "level": 132.0, "timing": "fasting"}` or
/// `{"kind": "blood_pressure", "systolic": 150, "diastolic": 95}`, with an
/// optional RFC 3339 `recorded_at`.
#[derive(Debug, Deserialize)]
pub struct LogVitalRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub recorded_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub payload: VitalPayload,
}

#[derive(Debug, Deserialize)]
pub struct VitalsQuery {
    #[serde(default)]
    pub day: Option<Date>,
}

#[derive(Debug, Serialize)]
pub struct LoggedReading {
    pub reading: VitalReading,
    pub alerts: Vec<Alert>,
}
