use anyhow::Context;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Reminder, ReminderRow};
use crate::engine::period::day_range;

const REMINDER_COLUMNS: &str = "id, user_id, title, kind, times, start_date, end_date, is_active, \
     completed_times, last_reset_date, created_at";

pub async fn list_reminders(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Reminder>> {
    let rows = sqlx::query_as::<_, ReminderRow>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE user_id = $1 ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list reminders")?;
    rows.into_iter().map(Reminder::try_from).collect()
}

pub async fn get_reminder(
    db: &PgPool,
    user_id: Uuid,
    reminder_id: Uuid,
) -> anyhow::Result<Option<Reminder>> {
    let row = sqlx::query_as::<_, ReminderRow>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = $1 AND user_id = $2"
    ))
    .bind(reminder_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("get reminder")?;
    row.map(Reminder::try_from).transpose()
}

pub async fn insert_reminder(db: &PgPool, r: &Reminder) -> anyhow::Result<Reminder> {
    let row = sqlx::query_as::<_, ReminderRow>(&format!(
        r#"
        INSERT INTO reminders (id, user_id, title, kind, times, start_date, end_date, is_active,
                               completed_times, last_reset_date, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {REMINDER_COLUMNS}
        "#
    ))
    .bind(r.id)
    .bind(r.user_id)
    .bind(&r.title)
    .bind(r.kind.as_str())
    .bind(Json(&r.times))
    .bind(r.start_date)
    .bind(r.end_date)
    .bind(r.is_active)
    .bind(&r.completed_times)
    .bind(r.last_reset_date)
    .bind(r.created_at)
    .fetch_one(db)
    .await
    .context("insert reminder")?;
    Reminder::try_from(row)
}

/// Updates the editable fields; completion state is left alone.
pub async fn update_reminder(db: &PgPool, r: &Reminder) -> anyhow::Result<Option<Reminder>> {
    let row = sqlx::query_as::<_, ReminderRow>(&format!(
        r#"
        UPDATE reminders
           SET title = $3, kind = $4, times = $5, start_date = $6, end_date = $7, is_active = $8
         WHERE id = $1 AND user_id = $2
        RETURNING {REMINDER_COLUMNS}
        "#
    ))
    .bind(r.id)
    .bind(r.user_id)
    .bind(&r.title)
    .bind(r.kind.as_str())
    .bind(Json(&r.times))
    .bind(r.start_date)
    .bind(r.end_date)
    .bind(r.is_active)
    .fetch_optional(db)
    .await
    .context("update reminder")?;
    row.map(Reminder::try_from).transpose()
}

pub async fn save_completions(db: &PgPool, r: &Reminder) -> anyhow::Result<()> {
    sqlx::query("UPDATE reminders SET completed_times = $2, last_reset_date = $3 WHERE id = $1")
        .bind(r.id)
        .bind(&r.completed_times)
        .bind(r.last_reset_date)
        .execute(db)
        .await
        .context("save reminder completions")?;
    Ok(())
}

/// `[start, end)` of `now`'s local day. A reset stamped inside it counts as
/// today's.
pub fn reset_guard(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    day_range(now)
}

/// Clears completions unless the row was already reset today, e.g. by a
/// concurrent toggle. Returns whether this call did the reset.
pub async fn reset_completions(db: &PgPool, reminder_id: Uuid, now: OffsetDateTime) -> anyhow::Result<bool> {
    let (start, end) = reset_guard(now);
    let done = sqlx::query(
        r#"
        UPDATE reminders
           SET completed_times = '{}', last_reset_date = $2
         WHERE id = $1
           AND (last_reset_date IS NULL OR last_reset_date < $3 OR last_reset_date >= $4)
        "#,
    )
    .bind(reminder_id)
    .bind(now)
    .bind(start)
    .bind(end)
    .execute(db)
    .await
    .context("reset reminder completions")?;
    Ok(done.rows_affected() == 1)
}

pub async fn delete_reminder(db: &PgPool, user_id: Uuid, reminder_id: Uuid) -> anyhow::Result<bool> {
    let done = sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
        .bind(reminder_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete reminder")?;
    Ok(done.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn inside(at: OffsetDateTime, now: OffsetDateTime) -> bool {
        let (start, end) = reset_guard(now);
        start <= at && at < end
    }

    #[test]
    fn guard_covers_the_local_day() {
        let now = datetime!(2026-03-10 21:00 +05:00);
        // stored in UTC, still the user's morning
        assert!(inside(datetime!(2026-03-09 19:30 UTC), now));
        assert!(inside(datetime!(2026-03-10 09:00 +05:00), now));
        assert!(!inside(datetime!(2026-03-09 18:59 UTC), now));
        assert!(!inside(datetime!(2026-03-11 00:00 +05:00), now));
    }

    #[test]
    fn guard_agrees_with_the_in_memory_reset() {
        let now = datetime!(2026-03-10 21:00 -04:00);
        for at in [
            datetime!(2026-03-10 03:59 UTC),
            datetime!(2026-03-10 04:00 UTC),
            datetime!(2026-03-11 01:00 UTC),
            datetime!(2026-03-11 04:00 UTC),
        ] {
            let mut r = crate::engine::fixtures::reminder("Blood test", &[(9, 0)]);
            r.last_reset_date = Some(at);
            assert_eq!(r.reset_completed_times_if_needed(now), !inside(at, now), "{at}");
        }
    }
}
