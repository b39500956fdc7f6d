use std::collections::HashMap;

use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use super::repo_types::{DoseLogEvent, Medicine, MedicineRecord, ScheduledDose};

const MEDICINE_COLUMNS: &str =
    "id, user_id, name, dosage, purpose, is_active, start_date, end_date, created_at";
const EVENT_COLUMNS: &str = "id, medicine_id, scheduled_dose_id, day, is_taken, recorded_at";

pub async fn list_medicines(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Medicine>> {
    let rows = sqlx::query_as::<_, Medicine>(&format!(
        "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE user_id = $1 ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list medicines")?;
    Ok(rows)
}

pub async fn get_medicine(
    db: &PgPool,
    user_id: Uuid,
    medicine_id: Uuid,
) -> anyhow::Result<Option<Medicine>> {
    let row = sqlx::query_as::<_, Medicine>(&format!(
        "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = $1 AND user_id = $2"
    ))
    .bind(medicine_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("get medicine")?;
    Ok(row)
}

pub async fn list_doses(db: &PgPool, medicine_ids: &[Uuid]) -> anyhow::Result<Vec<ScheduledDose>> {
    let rows = sqlx::query_as::<_, ScheduledDose>(
        r#"
        SELECT id, medicine_id, hour, minute
          FROM scheduled_doses
         WHERE medicine_id = ANY($1)
         ORDER BY hour, minute
        "#,
    )
    .bind(medicine_ids)
    .fetch_all(db)
    .await
    .context("list scheduled doses")?;
    Ok(rows)
}

/// Events of the given medicines with `from <= day <= to`.
pub async fn list_events(
    db: &PgPool,
    medicine_ids: &[Uuid],
    from: Date,
    to: Date,
) -> anyhow::Result<Vec<DoseLogEvent>> {
    let rows = sqlx::query_as::<_, DoseLogEvent>(&format!(
        r#"
        SELECT {EVENT_COLUMNS}
          FROM dose_log_events
         WHERE medicine_id = ANY($1) AND day BETWEEN $2 AND $3
         ORDER BY day, recorded_at
        "#
    ))
    .bind(medicine_ids)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
    .context("list dose log events")?;
    Ok(rows)
}

/// Groups doses and events under their medicines, keeping medicine order.
pub fn assemble_records(
    medicines: Vec<Medicine>,
    doses: Vec<ScheduledDose>,
    events: Vec<DoseLogEvent>,
) -> Vec<MedicineRecord> {
    let mut doses_by: HashMap<Uuid, Vec<ScheduledDose>> = HashMap::new();
    for d in doses {
        doses_by.entry(d.medicine_id).or_default().push(d);
    }
    let mut events_by: HashMap<Uuid, Vec<DoseLogEvent>> = HashMap::new();
    for e in events {
        events_by.entry(e.medicine_id).or_default().push(e);
    }
    medicines
        .into_iter()
        .map(|m| {
            let doses = doses_by.remove(&m.id).unwrap_or_default();
            let events = events_by.remove(&m.id).unwrap_or_default();
            MedicineRecord::new(m, doses, events)
        })
        .collect()
}

/// Medicines of the user with their doses and the events in `from..=to`.
pub async fn load_records(
    db: &PgPool,
    medicines: Vec<Medicine>,
    from: Date,
    to: Date,
) -> anyhow::Result<Vec<MedicineRecord>> {
    let ids: Vec<Uuid> = medicines.iter().map(|m| m.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let doses = list_doses(db, &ids).await?;
    let events = list_events(db, &ids, from, to).await?;
    Ok(assemble_records(medicines, doses, events))
}

pub async fn load_user_records(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<Vec<MedicineRecord>> {
    let medicines = list_medicines(db, user_id).await?;
    load_records(db, medicines, from, to).await
}

pub async fn insert_medicine_tx(
    tx: &mut Transaction<'_, Postgres>,
    m: &Medicine,
) -> anyhow::Result<Medicine> {
    let row = sqlx::query_as::<_, Medicine>(&format!(
        r#"
        INSERT INTO medicines (id, user_id, name, dosage, purpose, is_active, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {MEDICINE_COLUMNS}
        "#
    ))
    .bind(m.id)
    .bind(m.user_id)
    .bind(&m.name)
    .bind(&m.dosage)
    .bind(&m.purpose)
    .bind(m.is_active)
    .bind(m.start_date)
    .bind(m.end_date)
    .fetch_one(&mut **tx)
    .await
    .context("insert medicine")?;
    Ok(row)
}

pub async fn update_medicine_tx(
    tx: &mut Transaction<'_, Postgres>,
    m: &Medicine,
) -> anyhow::Result<Medicine> {
    let row = sqlx::query_as::<_, Medicine>(&format!(
        r#"
        UPDATE medicines
           SET name = $3, dosage = $4, purpose = $5, is_active = $6,
               start_date = $7, end_date = $8
         WHERE id = $1 AND user_id = $2
        RETURNING {MEDICINE_COLUMNS}
        "#
    ))
    .bind(m.id)
    .bind(m.user_id)
    .bind(&m.name)
    .bind(&m.dosage)
    .bind(&m.purpose)
    .bind(m.is_active)
    .bind(m.start_date)
    .bind(m.end_date)
    .fetch_one(&mut **tx)
    .await
    .context("update medicine")?;
    Ok(row)
}

pub async fn insert_dose_tx(
    tx: &mut Transaction<'_, Postgres>,
    dose: &ScheduledDose,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO scheduled_doses (id, medicine_id, hour, minute) VALUES ($1, $2, $3, $4)")
        .bind(dose.id)
        .bind(dose.medicine_id)
        .bind(dose.hour)
        .bind(dose.minute)
        .execute(&mut **tx)
        .await
        .context("insert scheduled dose")?;
    Ok(())
}

/// Removing a dose also removes its log events.
pub async fn delete_doses_tx(
    tx: &mut Transaction<'_, Postgres>,
    dose_ids: &[Uuid],
) -> anyhow::Result<()> {
    if dose_ids.is_empty() {
        return Ok(());
    }
    sqlx::query("DELETE FROM scheduled_doses WHERE id = ANY($1)")
        .bind(dose_ids)
        .execute(&mut **tx)
        .await
        .context("delete scheduled doses")?;
    Ok(())
}

pub async fn delete_medicine(db: &PgPool, user_id: Uuid, medicine_id: Uuid) -> anyhow::Result<bool> {
    let done = sqlx::query("DELETE FROM medicines WHERE id = $1 AND user_id = $2")
        .bind(medicine_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete medicine")?;
    Ok(done.rows_affected() == 1)
}

pub async fn deactivate_medicines(db: &PgPool, medicine_ids: &[Uuid]) -> anyhow::Result<u64> {
    if medicine_ids.is_empty() {
        return Ok(0);
    }
    let done = sqlx::query("UPDATE medicines SET is_active = FALSE WHERE id = ANY($1) AND is_active")
        .bind(medicine_ids)
        .execute(db)
        .await
        .context("deactivate medicines")?;
    Ok(done.rows_affected())
}

/// Inserts not-taken events; existing `(dose, day)` rows win. Returns the
/// rows actually written.
pub async fn insert_missed_events(
    db: &PgPool,
    events: &[DoseLogEvent],
) -> anyhow::Result<Vec<DoseLogEvent>> {
    let mut written = Vec::with_capacity(events.len());
    for e in events {
        let row = sqlx::query_as::<_, DoseLogEvent>(&format!(
            r#"
            INSERT INTO dose_log_events (id, medicine_id, scheduled_dose_id, day, is_taken, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (scheduled_dose_id, day) DO NOTHING
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(e.id)
        .bind(e.medicine_id)
        .bind(e.scheduled_dose_id)
        .bind(e.day)
        .bind(e.is_taken)
        .bind(e.recorded_at)
        .fetch_optional(db)
        .await
        .context("insert missed dose event")?;
        written.extend(row);
    }
    Ok(written)
}

/// Writes the outcome for `(dose, day)`, flipping an existing row in place.
pub async fn upsert_event(db: &PgPool, e: &DoseLogEvent) -> anyhow::Result<DoseLogEvent> {
    let row = sqlx::query_as::<_, DoseLogEvent>(&format!(
        r#"
        INSERT INTO dose_log_events (id, medicine_id, scheduled_dose_id, day, is_taken, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (scheduled_dose_id, day)
        DO UPDATE SET is_taken = EXCLUDED.is_taken, recorded_at = EXCLUDED.recorded_at
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(e.id)
    .bind(e.medicine_id)
    .bind(e.scheduled_dose_id)
    .bind(e.day)
    .bind(e.is_taken)
    .bind(e.recorded_at)
    .fetch_one(db)
    .await
    .context("upsert dose event")?;
    Ok(row)
}

pub async fn delete_event(db: &PgPool, scheduled_dose_id: Uuid, day: Date) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM dose_log_events WHERE scheduled_dose_id = $1 AND day = $2")
        .bind(scheduled_dose_id)
        .bind(day)
        .execute(db)
        .await
        .context("delete dose event")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::medicine_record;

    #[test]
    fn assemble_groups_children_under_their_medicine() {
        let a = medicine_record("Metformin", &[(8, 0), (20, 0)]);
        let b = medicine_record("Aspirin", &[(9, 0)]);
        let doses: Vec<ScheduledDose> = b.doses.iter().chain(a.doses.iter()).cloned().collect();
        let medicines = vec![a.medicine.clone(), b.medicine.clone()];

        let records = assemble_records(medicines, doses, Vec::new());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].medicine.name, "Metformin");
        assert_eq!(records[0].doses.len(), 2);
        assert_eq!(records[1].doses.len(), 1);
        assert!(records.iter().all(|r| r.events.is_empty()));
    }
}
