use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use super::dto::AlertSettingsRequest;
use super::repo;
use super::repo_types::{Alert, AlertSettings, AlertStatus};
use crate::notifier::Notifier;

/// Final delivery state of a raised alert.
pub fn delivery_outcome(
    result: &anyhow::Result<()>,
    now: OffsetDateTime,
) -> (AlertStatus, Option<OffsetDateTime>) {
    match result {
        Ok(()) => (AlertStatus::Sent, Some(now)),
        Err(_) => (AlertStatus::Failed, None),
    }
}

/// Hands each alert to the notifier and records the outcome on it. A failed
/// delivery marks that alert failed and the rest are still attempted.
pub async fn deliver_all(
    notifier: &dyn Notifier,
    alerts: Vec<Alert>,
    now: OffsetDateTime,
) -> Vec<Alert> {
    let mut delivered = Vec::with_capacity(alerts.len());
    for mut alert in alerts {
        let result = notifier.deliver(&alert).await;
        if let Err(e) = &result {
            warn!(alert_id = %alert.id, error = %e, "alert delivery failed");
        }
        let (status, sent_at) = delivery_outcome(&result, now);
        alert.status = status;
        alert.sent_at = sent_at;
        delivered.push(alert);
    }
    delivered
}

/// Persists each alert and hands the ones actually inserted to the notifier.
/// Alerts whose key already exists are dropped.
#[instrument(skip_all, fields(count = alerts.len()))]
pub async fn raise_alerts(
    db: &PgPool,
    notifier: &dyn Notifier,
    alerts: Vec<Alert>,
    now: OffsetDateTime,
) -> anyhow::Result<Vec<Alert>> {
    let mut fresh = Vec::with_capacity(alerts.len());
    for alert in alerts {
        if repo::insert_alert(db, &alert).await? {
            fresh.push(alert);
        } else {
            debug!(user_id = %alert.user_id, condition = alert.condition.as_str(), "alert already raised today");
        }
    }

    let raised = deliver_all(notifier, fresh, now).await;
    for alert in &raised {
        repo::set_status(db, alert.id, alert.status, alert.sent_at).await?;
        info!(alert_id = %alert.id, user_id = %alert.user_id, status = alert.status.as_str(), "alert raised");
    }
    Ok(raised)
}

fn check_range<T: PartialOrd + std::fmt::Display>(name: &str, min: T, max: T) -> Result<(), String> {
    if min > max {
        return Err(format!("{name}: min {min} is above max {max}"));
    }
    Ok(())
}

/// Validated settings from a request: every range must have min <= max,
/// contacts are trimmed and blank ones dropped.
pub fn settings_from_request(
    user_id: uuid::Uuid,
    req: AlertSettingsRequest,
) -> Result<AlertSettings, String> {
    check_range("systolic", req.bp_min_systolic, req.bp_max_systolic)?;
    check_range("diastolic", req.bp_min_diastolic, req.bp_max_diastolic)?;
    check_range("fasting sugar", req.fasting_sugar_min, req.fasting_sugar_max)?;
    check_range(
        "after-meal sugar",
        req.after_meal_sugar_min,
        req.after_meal_sugar_max,
    )?;
    if [req.fasting_sugar_min, req.fasting_sugar_max, req.after_meal_sugar_min, req.after_meal_sugar_max]
        .iter()
        .any(|v| !v.is_finite())
    {
        return Err("sugar thresholds must be finite numbers".into());
    }

    let mut contacts: Vec<String> = Vec::new();
    for contact in req.emergency_contacts {
        let contact = contact.trim();
        if !contact.is_empty() && !contacts.iter().any(|c| c == contact) {
            contacts.push(contact.to_string());
        }
    }

    Ok(AlertSettings {
        user_id,
        bp_min_systolic: req.bp_min_systolic,
        bp_max_systolic: req.bp_max_systolic,
        bp_min_diastolic: req.bp_min_diastolic,
        bp_max_diastolic: req.bp_max_diastolic,
        fasting_sugar_min: req.fasting_sugar_min,
        fasting_sugar_max: req.fasting_sugar_max,
        after_meal_sugar_min: req.after_meal_sugar_min,
        after_meal_sugar_max: req.after_meal_sugar_max,
        emergency_contacts: contacts,
    })
}
