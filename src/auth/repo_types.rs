use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

/// Offsets outside this range do not exist on any civil clock.
pub const MIN_OFFSET_MINUTES: i32 = -12 * 60;
pub const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Patient name used in alert content.
    pub display_name: String,
    /// Defines the user's calendar day.
    pub utc_offset_minutes: i32,
    pub created_at: OffsetDateTime,
}

pub fn offset_from_minutes(minutes: i32) -> Option<UtcOffset> {
    if !(MIN_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
        return None;
    }
    UtcOffset::from_whole_seconds(minutes * 60).ok()
}

impl User {
    pub fn offset(&self) -> UtcOffset {
        offset_from_minutes(self.utc_offset_minutes).unwrap_or(UtcOffset::UTC)
    }

    /// `instant` on the user's local clock.
    pub fn local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.offset())
    }

    /// The single "now" a request or job threads through the engine.
    pub fn now(&self) -> OffsetDateTime {
        self.local(OffsetDateTime::now_utc())
    }
}
