use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Per-user thresholds and emergency contacts. Missing rows fall back to
/// [`AlertSettings::defaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AlertSettings {
    pub user_id: Uuid,
    pub bp_min_systolic: i32,
    pub bp_max_systolic: i32,
    pub bp_min_diastolic: i32,
    pub bp_max_diastolic: i32,
    pub fasting_sugar_min: f64,
    pub fasting_sugar_max: f64,
    pub after_meal_sugar_min: f64,
    pub after_meal_sugar_max: f64,
    pub emergency_contacts: Vec<String>,
}

impl AlertSettings {
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            bp_min_systolic: 90,
            bp_max_systolic: 120,
            bp_min_diastolic: 60,
            bp_max_diastolic: 80,
            fasting_sugar_min: 70.0,
            fasting_sugar_max: 100.0,
            after_meal_sugar_min: 70.0,
            after_meal_sugar_max: 140.0,
            emergency_contacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Emergency,
    Reminder,
    Report,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Emergency => "emergency",
            AlertKind::Reminder => "reminder",
            AlertKind::Report => "report",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "emergency" => Some(AlertKind::Emergency),
            "reminder" => Some(AlertKind::Reminder),
            "report" => Some(AlertKind::Report),
            _ => None,
        }
    }
}

/// What an alert is about; part of the de-duplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    BloodPressureOutOfRange,
    SugarOutOfRange,
    MissedDoses,
    MissedReminders,
}

impl AlertCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertCondition::BloodPressureOutOfRange => "bp_out_of_range",
            AlertCondition::SugarOutOfRange => "sugar_out_of_range",
            AlertCondition::MissedDoses => "missed_doses",
            AlertCondition::MissedReminders => "missed_reminders",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bp_out_of_range" => Some(AlertCondition::BloodPressureOutOfRange),
            "sugar_out_of_range" => Some(AlertCondition::SugarOutOfRange),
            "missed_doses" => Some(AlertCondition::MissedDoses),
            "missed_reminders" => Some(AlertCondition::MissedReminders),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Sent,
    Failed,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Sent => "sent",
            AlertStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AlertStatus::Pending),
            "sent" => Some(AlertStatus::Sent),
            "failed" => Some(AlertStatus::Failed),
            _ => None,
        }
    }
}

/// At most one alert exists per key; enforced by a unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AlertKey {
    pub user_id: Uuid,
    pub kind: AlertKind,
    pub condition: AlertCondition,
    pub day: Date,
}

#[derive(Debug, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub condition: String,
    pub day: Date,
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
    pub status: String,
    pub sent_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: AlertKind,
    pub condition: AlertCondition,
    pub day: Date,
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
    pub status: AlertStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Alert {
    /// New pending alert for `key`.
    pub fn compose(
        key: AlertKey,
        recipients: Vec<String>,
        subject: String,
        content: String,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: key.user_id,
            kind: key.kind,
            condition: key.condition,
            day: key.day,
            recipients,
            subject,
            content,
            status: AlertStatus::Pending,
            sent_at: None,
            created_at: now,
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey {
            user_id: self.user_id,
            kind: self.kind,
            condition: self.condition,
            day: self.day,
        }
    }

    pub fn recipients_line(&self) -> String {
        self.recipients.join(", ")
    }
}

impl TryFrom<AlertRow> for Alert {
    type Error = anyhow::Error;

    fn try_from(r: AlertRow) -> Result<Self, Self::Error> {
        let kind = AlertKind::from_str(&r.kind)
            .ok_or_else(|| anyhow::anyhow!("unknown alert kind `{}`", r.kind))?;
        let condition = AlertCondition::from_str(&r.condition)
            .ok_or_else(|| anyhow::anyhow!("unknown alert condition `{}`", r.condition))?;
        let status = AlertStatus::from_str(&r.status)
            .ok_or_else(|| anyhow::anyhow!("unknown alert status `{}`", r.status))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            kind,
            condition,
            day: r.day,
            recipients: r.recipients,
            subject: r.subject,
            content: r.content,
            status,
            sent_at: r.sent_at,
            created_at: r.created_at,
        })
    }
}
