use serde::{ser::SerializeSeq, Deserialize, Serialize, Serializer};
use sqlx::{types::Json, FromRow};
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};
use uuid::Uuid;

use crate::engine::period::TimeOfDay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Checkup,
    Other,
}

impl ReminderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderKind::Checkup => "checkup",
            ReminderKind::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "checkup" => Some(ReminderKind::Checkup),
            "other" => Some(ReminderKind::Other),
            _ => None,
        }
    }
}

/// Raw `reminders` row.
#[derive(Debug, FromRow)]
pub struct ReminderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub kind: String,
    pub times: Json<Vec<TimeOfDay>>,
    pub start_date: Date,
    pub end_date: Date,
    pub is_active: bool,
    pub completed_times: Vec<OffsetDateTime>,
    pub last_reset_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Recurring non-medicine reminder (checkups). `completed_times` holds one
/// entry per slot completed today and is cleared by the daily reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub kind: ReminderKind,
    pub times: Vec<TimeOfDay>,
    pub start_date: Date,
    pub end_date: Date,
    pub is_active: bool,
    #[serde(serialize_with = "serialize_instants")]
    pub completed_times: Vec<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_reset_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = anyhow::Error;

    fn try_from(r: ReminderRow) -> Result<Self, Self::Error> {
        let kind = ReminderKind::from_str(&r.kind)
            .ok_or_else(|| anyhow::anyhow!("unknown reminder kind `{}`", r.kind))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            kind,
            times: r.times.0,
            start_date: r.start_date,
            end_date: r.end_date,
            is_active: r.is_active,
            completed_times: r.completed_times,
            last_reset_date: r.last_reset_date,
            created_at: r.created_at,
        })
    }
}

fn serialize_instants<S: Serializer>(instants: &[OffsetDateTime], s: S) -> Result<S::Ok, S::Error> {
    let mut seq = s.serialize_seq(Some(instants.len()))?;
    for at in instants {
        let text = at.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        seq.serialize_element(&text)?;
    }
    seq.end()
}
