//! Per-slot state of recurring reminders.
//!
//! A slot is Pending until its time passes, then Overdue; either can be
//! completed. Completion is stored as a timestamp normalised to the slot's
//! hour and minute on the current day, and the whole list is cleared once per
//! calendar day by [`Reminder::reset_completed_times_if_needed`].

use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};

use super::error::EngineError;
use super::period::{combine, day_of, TimeOfDay};
use crate::reminders::repo_types::Reminder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Pending,
    Overdue,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub time: TimeOfDay,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub state: SlotState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "at", rename_all = "snake_case")]
pub enum SlotToggle {
    #[serde(with = "time::serde::rfc3339")]
    Completed(OffsetDateTime),
    Reopened,
}

impl Reminder {
    pub fn has_period_ended(&self, now: OffsetDateTime) -> bool {
        self.end_date < day_of(now)
    }

    pub fn is_future(&self, now: OffsetDateTime) -> bool {
        self.start_date > day_of(now)
    }

    /// Active, started and not yet ended, day-granular and inclusive.
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        self.is_active && !self.has_period_ended(now) && !self.is_future(now)
    }

    fn completion_matches(at: OffsetDateTime, time: TimeOfDay, day: Date, offset: UtcOffset) -> bool {
        let local = at.to_offset(offset);
        local.date() == day && TimeOfDay::of(local) == time
    }

    pub fn is_time_slot_completed(&self, time: TimeOfDay, day: Date, offset: UtcOffset) -> bool {
        self.completed_times
            .iter()
            .any(|&at| Self::completion_matches(at, time, day, offset))
    }

    pub fn is_time_slot_overdue(&self, time: TimeOfDay, now: OffsetDateTime) -> bool {
        if !self.is_live(now) {
            return false;
        }
        let today = day_of(now);
        match combine(today, time, now.offset()) {
            Some(at) => at < now && !self.is_time_slot_completed(time, today, now.offset()),
            None => false,
        }
    }

    /// State of every valid slot today, in time order.
    pub fn slot_states(&self, now: OffsetDateTime) -> Vec<SlotView> {
        let today = day_of(now);
        let mut views: Vec<SlotView> = self
            .times
            .iter()
            .filter_map(|&time| {
                let scheduled_at = combine(today, time, now.offset())?;
                let state = if self.is_time_slot_completed(time, today, now.offset()) {
                    SlotState::Completed
                } else if self.is_time_slot_overdue(time, now) {
                    SlotState::Overdue
                } else {
                    SlotState::Pending
                };
                Some(SlotView {
                    time,
                    scheduled_at,
                    state,
                })
            })
            .collect();
        views.sort_by_key(|v| v.scheduled_at);
        views
    }

    /// Overdue slots; at the end of the day these are the missed ones.
    pub fn missed_slots(&self, now: OffsetDateTime) -> Vec<TimeOfDay> {
        self.slot_states(now)
            .into_iter()
            .filter(|v| v.state == SlotState::Overdue)
            .map(|v| v.time)
            .collect()
    }

    /// Completes a pending or overdue slot, or reopens a completed one.
    pub fn toggle_time_slot(
        &mut self,
        time: TimeOfDay,
        now: OffsetDateTime,
    ) -> Result<SlotToggle, EngineError> {
        if !self.times.contains(&time) {
            return Err(EngineError::UnknownSlot {
                reminder_id: self.id,
                slot: time,
            });
        }
        let today = day_of(now);
        let offset = now.offset();
        let at = combine(today, time, offset).ok_or(EngineError::InvalidTimeOfDay(time))?;
        if !self.is_live(now) {
            return Err(EngineError::ReminderInactive(self.id));
        }

        if self.is_time_slot_completed(time, today, offset) {
            self.completed_times
                .retain(|&c| !Self::completion_matches(c, time, today, offset));
            Ok(SlotToggle::Reopened)
        } else {
            self.completed_times.push(at);
            Ok(SlotToggle::Completed(at))
        }
    }

    /// Clears completions when the last reset happened on another day.
    /// Returns whether anything changed.
    pub fn reset_completed_times_if_needed(&mut self, now: OffsetDateTime) -> bool {
        let today = day_of(now);
        let reset_today = self
            .last_reset_date
            .map(|at| at.to_offset(now.offset()).date() == today)
            .unwrap_or(false);
        if reset_today {
            return false;
        }
        self.completed_times.clear();
        self.last_reset_date = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{reminder, DAY};
    use time::macros::{date, datetime};

    const TEN_AM: OffsetDateTime = datetime!(2026-03-10 10:00 UTC);

    #[test]
    fn slots_move_from_pending_to_overdue() {
        let r = reminder("Blood test", &[(9, 0), (14, 0)]);
        let states: Vec<_> = r.slot_states(TEN_AM).into_iter().map(|v| v.state).collect();
        assert_eq!(states, vec![SlotState::Overdue, SlotState::Pending]);
        assert!(r.is_time_slot_overdue(TimeOfDay::new(9, 0), TEN_AM));
        assert!(!r.is_time_slot_overdue(TimeOfDay::new(14, 0), TEN_AM));
    }

    #[test]
    fn completing_overdue_slot_marks_it_done() {
        let mut r = reminder("Blood test", &[(9, 0)]);
        let slot = TimeOfDay::new(9, 0);
        let toggle = r.toggle_time_slot(slot, TEN_AM).unwrap();
        assert_eq!(toggle, SlotToggle::Completed(datetime!(2026-03-10 09:00 UTC)));
        assert!(r.is_time_slot_completed(slot, DAY, UtcOffset::UTC));
        assert!(!r.is_time_slot_overdue(slot, TEN_AM));
        assert_eq!(r.slot_states(TEN_AM)[0].state, SlotState::Completed);
    }

    #[test]
    fn complete_then_reopen_restores_completions() {
        let mut r = reminder("Checkup", &[(9, 0), (18, 0)]);
        r.toggle_time_slot(TimeOfDay::new(18, 0), TEN_AM).unwrap();
        let before = r.completed_times.clone();

        let slot = TimeOfDay::new(9, 0);
        r.toggle_time_slot(slot, TEN_AM).unwrap();
        assert_eq!(r.completed_times.len(), 2);
        assert_eq!(r.toggle_time_slot(slot, TEN_AM).unwrap(), SlotToggle::Reopened);
        assert_eq!(r.completed_times, before);
    }

    #[test]
    fn completion_from_yesterday_does_not_count_today() {
        let mut r = reminder("Checkup", &[(9, 0)]);
        r.completed_times.push(datetime!(2026-03-09 09:00 UTC));
        assert!(!r.is_time_slot_completed(TimeOfDay::new(9, 0), DAY, UtcOffset::UTC));
        assert!(r.is_time_slot_overdue(TimeOfDay::new(9, 0), TEN_AM));
    }

    #[test]
    fn completions_are_matched_in_local_time() {
        let mut r = reminder("Checkup", &[(0, 30)]);
        // 00:30 at +02:00 is 22:30 the previous day in UTC
        r.completed_times.push(datetime!(2026-03-09 22:30 UTC));
        assert!(r.is_time_slot_completed(
            TimeOfDay::new(0, 30),
            DAY,
            time::macros::offset!(+2)
        ));
    }

    #[test]
    fn reset_runs_once_per_day() {
        let mut r = reminder("Checkup", &[(9, 0)]);
        r.completed_times.push(datetime!(2026-03-09 09:00 UTC));
        r.last_reset_date = Some(datetime!(2026-03-09 07:00 UTC));

        assert!(r.reset_completed_times_if_needed(TEN_AM));
        assert!(r.completed_times.is_empty());
        assert_eq!(r.last_reset_date, Some(TEN_AM));

        r.toggle_time_slot(TimeOfDay::new(9, 0), TEN_AM).unwrap();
        let later = datetime!(2026-03-10 22:00 UTC);
        assert!(!r.reset_completed_times_if_needed(later));
        assert_eq!(r.completed_times.len(), 1);
        assert_eq!(r.last_reset_date, Some(TEN_AM));
    }

    #[test]
    fn period_checks_are_inclusive() {
        let mut r = reminder("Checkup", &[(9, 0)]);
        r.start_date = DAY;
        r.end_date = DAY;
        assert!(r.is_live(TEN_AM));
        assert!(r.is_future(datetime!(2026-03-09 23:59 UTC)));
        assert!(r.has_period_ended(datetime!(2026-03-11 00:00 UTC)));
    }

    #[test]
    fn toggle_rejects_unknown_inactive_and_invalid_slots() {
        let mut r = reminder("Checkup", &[(9, 0), (27, 0)]);
        assert!(matches!(
            r.toggle_time_slot(TimeOfDay::new(10, 0), TEN_AM),
            Err(EngineError::UnknownSlot { .. })
        ));
        assert_eq!(
            r.toggle_time_slot(TimeOfDay::new(27, 0), TEN_AM),
            Err(EngineError::InvalidTimeOfDay(TimeOfDay::new(27, 0)))
        );
        r.end_date = date!(2026 - 03 - 09);
        assert_eq!(
            r.toggle_time_slot(TimeOfDay::new(9, 0), TEN_AM),
            Err(EngineError::ReminderInactive(r.id))
        );
    }

    #[test]
    fn ended_reminder_is_never_overdue() {
        let mut r = reminder("Checkup", &[(9, 0)]);
        r.is_active = false;
        assert!(!r.is_time_slot_overdue(TimeOfDay::new(9, 0), TEN_AM));
        assert!(r.missed_slots(TEN_AM).is_empty());
    }
}
