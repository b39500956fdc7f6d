use async_trait::async_trait;
use tracing::{debug, info};

use crate::alerts::repo_types::Alert;

/// Hands a composed alert to whatever transport reaches the recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Writes alerts to the structured log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, alert: &Alert) -> anyhow::Result<()> {
        anyhow::ensure!(!alert.recipients.is_empty(), "alert {} has no recipients", alert.id);
        info!(
            alert_id = %alert.id,
            user_id = %alert.user_id,
            kind = alert.kind.as_str(),
            condition = alert.condition.as_str(),
            recipients = %alert.recipients_line(),
            subject = %alert.subject,
            "alert delivered"
        );
        debug!(alert_id = %alert.id, content = %alert.content, "alert content");
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingNotifier;
