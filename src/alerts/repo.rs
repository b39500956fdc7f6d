use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{Alert, AlertRow, AlertSettings, AlertStatus};

const SETTINGS_COLUMNS: &str = "user_id, bp_min_systolic, bp_max_systolic, bp_min_diastolic, \
     bp_max_diastolic, fasting_sugar_min, fasting_sugar_max, after_meal_sugar_min, \
     after_meal_sugar_max, emergency_contacts";

const ALERT_COLUMNS: &str =
    "id, user_id, kind, condition, day, recipients, subject, content, status, sent_at, created_at";

pub async fn insert_default_settings_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO alert_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .context("insert default alert settings")?;
    Ok(())
}

pub async fn find_settings(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<AlertSettings>> {
    let row = sqlx::query_as::<_, AlertSettings>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM alert_settings WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find alert settings")?;
    Ok(row)
}

/// Stored settings, or the defaults when the user has none yet.
pub async fn settings_or_default(db: &PgPool, user_id: Uuid) -> anyhow::Result<AlertSettings> {
    Ok(find_settings(db, user_id)
        .await?
        .unwrap_or_else(|| AlertSettings::defaults(user_id)))
}

pub async fn upsert_settings(db: &PgPool, s: &AlertSettings) -> anyhow::Result<AlertSettings> {
    let row = sqlx::query_as::<_, AlertSettings>(&format!(
        r#"
        INSERT INTO alert_settings ({SETTINGS_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id) DO UPDATE SET
            bp_min_systolic      = EXCLUDED.bp_min_systolic,
            bp_max_systolic      = EXCLUDED.bp_max_systolic,
            bp_min_diastolic     = EXCLUDED.bp_min_diastolic,
            bp_max_diastolic     = EXCLUDED.bp_max_diastolic,
            fasting_sugar_min    = EXCLUDED.fasting_sugar_min,
            fasting_sugar_max    = EXCLUDED.fasting_sugar_max,
            after_meal_sugar_min = EXCLUDED.after_meal_sugar_min,
            after_meal_sugar_max = EXCLUDED.after_meal_sugar_max,
            emergency_contacts   = EXCLUDED.emergency_contacts
        RETURNING {SETTINGS_COLUMNS}
        "#
    ))
    .bind(s.user_id)
    .bind(s.bp_min_systolic)
    .bind(s.bp_max_systolic)
    .bind(s.bp_min_diastolic)
    .bind(s.bp_max_diastolic)
    .bind(s.fasting_sugar_min)
    .bind(s.fasting_sugar_max)
    .bind(s.after_meal_sugar_min)
    .bind(s.after_meal_sugar_max)
    .bind(&s.emergency_contacts)
    .fetch_one(db)
    .await
    .context("upsert alert settings")?;
    Ok(row)
}

pub async fn list_alerts(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Alert>> {
    let rows = sqlx::query_as::<_, AlertRow>(&format!(
        r#"
        SELECT {ALERT_COLUMNS}
          FROM alerts
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list alerts")?;
    rows.into_iter().map(Alert::try_from).collect()
}

/// Alerts already raised for `day`, the input to de-duplication.
pub async fn alerts_on_day(db: &PgPool, user_id: Uuid, day: Date) -> anyhow::Result<Vec<Alert>> {
    let rows = sqlx::query_as::<_, AlertRow>(&format!(
        "SELECT {ALERT_COLUMNS} FROM alerts WHERE user_id = $1 AND day = $2"
    ))
    .bind(user_id)
    .bind(day)
    .fetch_all(db)
    .await
    .context("list alerts of day")?;
    rows.into_iter().map(Alert::try_from).collect()
}

/// Inserts unless an alert with the same key exists. Returns whether a row
/// was written.
pub async fn insert_alert(db: &PgPool, alert: &Alert) -> anyhow::Result<bool> {
    let done = sqlx::query(
        r#"
        INSERT INTO alerts (id, user_id, kind, condition, day, recipients, subject, content,
                            status, sent_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (user_id, kind, condition, day) DO NOTHING
        "#,
    )
    .bind(alert.id)
    .bind(alert.user_id)
    .bind(alert.kind.as_str())
    .bind(alert.condition.as_str())
    .bind(alert.day)
    .bind(&alert.recipients)
    .bind(&alert.subject)
    .bind(&alert.content)
    .bind(alert.status.as_str())
    .bind(alert.sent_at)
    .bind(alert.created_at)
    .execute(db)
    .await
    .context("insert alert")?;
    Ok(done.rows_affected() == 1)
}

pub async fn set_status(
    db: &PgPool,
    alert_id: Uuid,
    status: AlertStatus,
    sent_at: Option<OffsetDateTime>,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE alerts SET status = $2, sent_at = $3 WHERE id = $1")
        .bind(alert_id)
        .bind(status.as_str())
        .bind(sent_at)
        .execute(db)
        .await
        .context("update alert status")?;
    Ok(())
}
