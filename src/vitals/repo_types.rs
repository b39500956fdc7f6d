use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalKind {
    BloodPressure,
    Sugar,
}

impl VitalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VitalKind::BloodPressure => "blood_pressure",
            VitalKind::Sugar => "sugar",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "blood_pressure" => Some(VitalKind::BloodPressure),
            "sugar" => Some(VitalKind::Sugar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SugarTiming {
    Fasting,
    AfterMeal,
}

impl SugarTiming {
    pub fn as_str(self) -> &'static str {
        match self {
            SugarTiming::Fasting => "fasting",
            SugarTiming::AfterMeal => "after_meal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fasting" => Some(SugarTiming::Fasting),
            "after_meal" => Some(SugarTiming::AfterMeal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VitalPayload {
    BloodPressure { systolic: i32, diastolic: i32 },
    Sugar { level: f64, timing: SugarTiming },
}

impl VitalPayload {
    pub fn kind(&self) -> VitalKind {
        match self {
            VitalPayload::BloodPressure { .. } => VitalKind::BloodPressure,
            VitalPayload::Sugar { .. } => VitalKind::Sugar,
        }
    }
}

/// Raw `vital_readings` row; payload columns are nullable per kind.
#[derive(Debug, FromRow)]
pub struct VitalReadingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub recorded_at: OffsetDateTime,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub sugar_level: Option<f64>,
    pub sugar_timing: Option<String>,
}

/// Immutable once logged; a new measurement is a new reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalReading {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    #[serde(flatten)]
    pub payload: VitalPayload,
}

impl VitalReading {
    pub fn kind(&self) -> VitalKind {
        self.payload.kind()
    }
}

impl TryFrom<VitalReadingRow> for VitalReading {
    type Error = anyhow::Error;

    fn try_from(r: VitalReadingRow) -> Result<Self, Self::Error> {
        let payload = match VitalKind::from_str(&r.kind) {
            Some(VitalKind::BloodPressure) => match (r.systolic, r.diastolic) {
                (Some(systolic), Some(diastolic)) => VitalPayload::BloodPressure {
                    systolic,
                    diastolic,
                },
                _ => anyhow::bail!("blood pressure reading {} lacks values", r.id),
            },
            Some(VitalKind::Sugar) => {
                let timing = r
                    .sugar_timing
                    .as_deref()
                    .and_then(SugarTiming::from_str)
                    .ok_or_else(|| anyhow::anyhow!("sugar reading {} lacks timing", r.id))?;
                let level = r
                    .sugar_level
                    .ok_or_else(|| anyhow::anyhow!("sugar reading {} lacks level", r.id))?;
                VitalPayload::Sugar { level, timing }
            }
            None => anyhow::bail!("unknown vital kind `{}`", r.kind),
        };
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            recorded_at: r.recorded_at,
            payload,
        })
    }
}
