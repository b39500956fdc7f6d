//! Background trigger for the end-of-day cycle.

pub mod services;

use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::repo_types::User;
use crate::state::AppState;

/// Whether the cycle is due for a user whose local time is `local_now`.
pub fn is_due(local_now: OffsetDateTime, digest_hour: u8) -> bool {
    local_now.hour() >= digest_hour
}

/// One pass over every user. Returns how many cycles ran.
pub async fn tick(state: &AppState) -> anyhow::Result<usize> {
    let users = User::list_all(&state.db).await?;
    let mut ran = 0;
    for user in &users {
        let now = user.now();
        if !is_due(now, state.config.jobs.digest_hour) {
            continue;
        }
        match services::run_daily_cycle(state, user, now).await {
            Ok(_) => ran += 1,
            Err(e) => warn!(user_id = %user.id, error = %e, "daily cycle failed"),
        }
    }
    Ok(ran)
}

pub fn spawn(state: AppState) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.jobs.interval_secs);
    tokio::spawn(async move {
        info!(
            interval_secs = every.as_secs(),
            digest_hour = state.config.jobs.digest_hour,
            "daily cycle scheduler started"
        );
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = tick(&state).await {
                error!(error = %e, "daily cycle tick failed");
            }
        }
    })
}
