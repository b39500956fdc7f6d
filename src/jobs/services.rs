use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::alerts;
use crate::auth::repo_types::User;
use crate::engine::daily::{catch_up_days, plan_daily_cycle, DailyPlan, UserSnapshot};
use crate::engine::period::{day_of, day_range};
use crate::medicines;
use crate::reminders;
use crate::state::AppState;
use crate::vitals;

/// What a cycle actually wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub deactivated: u64,
    pub materialized: u64,
    pub reminders_reset: usize,
    pub alerts_raised: usize,
}

pub async fn load_snapshot(
    db: &PgPool,
    user: &User,
    now: OffsetDateTime,
) -> anyhow::Result<UserSnapshot> {
    let today = day_of(now);
    let first_day = catch_up_days(now).first().copied().unwrap_or(today);
    let (from, to) = day_range(now);
    Ok(UserSnapshot {
        patient_name: user.display_name.clone(),
        medicines: medicines::repo::load_user_records(db, user.id, first_day, today).await?,
        reminders: reminders::repo::list_reminders(db, user.id).await?,
        readings: vitals::repo::list_readings(db, user.id, from, to).await?,
        settings: alerts::repo::settings_or_default(db, user.id).await?,
        alerts_today: alerts::repo::alerts_on_day(db, user.id, today).await?,
    })
}

/// Writes the plan. Every step is idempotent, so a cycle interrupted half
/// way is completed by the next tick. Reminder resets skip rows another
/// writer already reset today.
pub async fn apply_plan(
    state: &AppState,
    plan: DailyPlan,
    now: OffsetDateTime,
) -> anyhow::Result<CycleOutcome> {
    let deactivated = medicines::repo::deactivate_medicines(&state.db, &plan.deactivated).await?;
    let materialized = medicines::repo::insert_missed_events(&state.db, &plan.missed_events)
        .await?
        .len() as u64;

    let mut reminders_reset = 0;
    for reminder_id in &plan.reset_reminders {
        if reminders::repo::reset_completions(&state.db, *reminder_id, now).await? {
            reminders_reset += 1;
        }
    }

    let raised =
        alerts::services::raise_alerts(&state.db, state.notifier.as_ref(), plan.alerts, now)
            .await?;

    Ok(CycleOutcome {
        deactivated,
        materialized,
        reminders_reset,
        alerts_raised: raised.len(),
    })
}

/// End-of-day cycle for one user at `now`, taken in the user's offset.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn run_daily_cycle(
    state: &AppState,
    user: &User,
    now: OffsetDateTime,
) -> anyhow::Result<CycleOutcome> {
    let mut snapshot = load_snapshot(&state.db, user, now).await?;
    let plan = plan_daily_cycle(&mut snapshot, state.config.sugar_policy, now);
    if plan.is_empty() {
        debug!("daily cycle has nothing to do");
        return Ok(CycleOutcome::default());
    }

    let outcome = apply_plan(state, plan, now).await?;
    info!(
        deactivated = outcome.deactivated,
        materialized = outcome.materialized,
        reminders_reset = outcome.reminders_reset,
        alerts_raised = outcome.alerts_raised,
        "daily cycle applied"
    );
    Ok(outcome)
}
