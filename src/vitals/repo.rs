use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{VitalPayload, VitalReading, VitalReadingRow};

const READING_COLUMNS: &str =
    "id, user_id, kind, recorded_at, systolic, diastolic, sugar_level, sugar_timing";

pub async fn insert_reading(db: &PgPool, r: &VitalReading) -> anyhow::Result<VitalReading> {
    let (systolic, diastolic, level, timing) = match r.payload {
        VitalPayload::BloodPressure {
            systolic,
            diastolic,
        } => (Some(systolic), Some(diastolic), None, None),
        VitalPayload::Sugar { level, timing } => (None, None, Some(level), Some(timing.as_str())),
    };

    let row = sqlx::query_as::<_, VitalReadingRow>(&format!(
        r#"
        INSERT INTO vital_readings (id, user_id, kind, recorded_at, systolic, diastolic,
                                    sugar_level, sugar_timing)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {READING_COLUMNS}
        "#
    ))
    .bind(r.id)
    .bind(r.user_id)
    .bind(r.kind().as_str())
    .bind(r.recorded_at)
    .bind(systolic)
    .bind(diastolic)
    .bind(level)
    .bind(timing)
    .fetch_one(db)
    .await
    .context("insert vital reading")?;
    VitalReading::try_from(row)
}

/// Readings with `from <= recorded_at < to`, oldest first.
pub async fn list_readings(
    db: &PgPool,
    user_id: Uuid,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> anyhow::Result<Vec<VitalReading>> {
    let rows = sqlx::query_as::<_, VitalReadingRow>(&format!(
        r#"
        SELECT {READING_COLUMNS}
          FROM vital_readings
         WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at < $3
         ORDER BY recorded_at
        "#
    ))
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
    .context("list vital readings")?;
    rows.into_iter().map(VitalReading::try_from).collect()
}
