use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::repo_types::{Reminder, ReminderKind};
use crate::engine::period::TimeOfDay;
use crate::engine::reminder::{SlotToggle, SlotView};

#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    pub title: String,
    #[serde(default = "default_kind")]
    pub kind: ReminderKind,
    pub times: Vec<TimeOfDay>,
    pub start_date: Date,
    pub end_date: Date,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_kind() -> ReminderKind {
    ReminderKind::Checkup
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ReminderToday {
    pub reminder_id: Uuid,
    pub title: String,
    pub kind: ReminderKind,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub toggle: SlotToggle,
    pub reminder: Reminder,
}
