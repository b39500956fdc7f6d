use time::Date;
use uuid::Uuid;

use super::period::TimeOfDay;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("dose {dose_id} does not belong to medicine {medicine_id}")]
    UnknownDose { medicine_id: Uuid, dose_id: Uuid },
    #[error("medicine {0} is not active on {1}")]
    InactiveOnDay(Uuid, Date),
    #[error("{0} is in the future")]
    FutureDay(Date),
    #[error("reminder {reminder_id} has no slot at {slot}")]
    UnknownSlot { reminder_id: Uuid, slot: TimeOfDay },
    #[error("invalid time of day {0}")]
    InvalidTimeOfDay(TimeOfDay),
    #[error("reminder {0} is not active today")]
    ReminderInactive(Uuid),
    #[error("invalid reading: {0}")]
    InvalidReading(String),
}
