//! SLA breach detection. Every decision is derived from stored timestamps,
//! so a sweep can run on any schedule, twice in a row or concurrently with
//! user operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{apply_transition, lock_alarm};
use crate::config::SlaPolicy;
use crate::db::AlarmRepository;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::alarm::{Alarm, AlarmStatus};
use crate::models::assignment::Assignment;
use crate::models::log_entry::{AlarmEvent, SLA_EXCEEDED_REASON};
use crate::state_machine;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepOutcome {
    pub alarm_id: Uuid,
    pub previous_status: AlarmStatus,
    pub elapsed_minutes: f64,
}

/// Display-only SLA position of an alarm. Never triggers a transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaState {
    NotTracked,
    #[serde(rename_all = "camelCase")]
    WithinLimit { elapsed_minutes: f64, limit_minutes: i64 },
    #[serde(rename_all = "camelCase")]
    Warning { elapsed_minutes: f64, limit_minutes: i64 },
    #[serde(rename_all = "camelCase")]
    Breached { elapsed_minutes: f64, limit_minutes: i64 },
}

/// When the clock for the alarm's current status started.
fn clock_start(alarm: &Alarm, active: Option<&Assignment>) -> Option<DateTime<Utc>> {
    match alarm.status {
        AlarmStatus::Unassigned => Some(alarm.created_at),
        AlarmStatus::Assigned => active.map(|a| a.assigned_at),
        AlarmStatus::InProgress => active.and_then(|a| a.accepted_at),
        _ => None,
    }
}

fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - since).num_milliseconds() as f64 / 60_000.0
}

pub fn sla_state(
    alarm: &Alarm,
    active: Option<&Assignment>,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> SlaState {
    let (Some(limit_minutes), Some(start)) =
        (policy.limit_minutes(alarm.status), clock_start(alarm, active))
    else {
        return SlaState::NotTracked;
    };

    let elapsed_minutes = elapsed_minutes(start, now);
    let limit = limit_minutes as f64;
    if elapsed_minutes >= limit {
        SlaState::Breached {
            elapsed_minutes,
            limit_minutes,
        }
    } else if elapsed_minutes >= limit * policy.warning_ratio {
        SlaState::Warning {
            elapsed_minutes,
            limit_minutes,
        }
    } else {
        SlaState::WithinLimit {
            elapsed_minutes,
            limit_minutes,
        }
    }
}

/// Escalates one alarm if its current status has outlived its limit.
/// `Ok(None)` means there was nothing to do.
async fn escalate_if_breached(
    repo: &dyn AlarmRepository,
    policy: &SlaPolicy,
    alarm_id: Uuid,
    now: DateTime<Utc>,
) -> WorkflowResult<Option<SweepOutcome>> {
    let mut tx = repo.begin().await?;
    let alarm = lock_alarm(tx.as_mut(), alarm_id).await?;

    let Some(limit_minutes) = policy.limit_minutes(alarm.status) else {
        // Moved since the candidate snapshot was taken.
        state_machine::assert_transition(alarm.status, AlarmStatus::Escalated)?;
        return Ok(None);
    };

    let active = tx.active_assignment(alarm.id).await?;
    let Some(start) = clock_start(&alarm, active.as_ref()) else {
        warn!(
            alarm_id = %alarm.id,
            status = %alarm.status,
            "No active assignment to time the SLA from, skipping"
        );
        return Ok(None);
    };

    let elapsed = elapsed_minutes(start, now);
    if elapsed < limit_minutes as f64 {
        return Ok(None);
    }

    state_machine::assert_transition(alarm.status, AlarmStatus::Escalated)?;
    apply_transition(
        tx.as_mut(),
        &alarm,
        AlarmStatus::Escalated,
        AlarmEvent::AlarmAutoEscalated {
            reason: SLA_EXCEEDED_REASON.to_string(),
            elapsed_minutes: elapsed.round() as i64,
            previous_status: alarm.status,
        },
        None,
        now,
    )
    .await?;
    tx.commit().await?;

    Ok(Some(SweepOutcome {
        alarm_id: alarm.id,
        previous_status: alarm.status,
        elapsed_minutes: elapsed,
    }))
}

pub async fn run_sweep(
    repo: &dyn AlarmRepository,
    policy: &SlaPolicy,
) -> anyhow::Result<Vec<SweepOutcome>> {
    run_sweep_at(repo, policy, Utc::now()).await
}

/// One pass over every escalatable alarm. A failure on one alarm is logged
/// and skipped; only failing to list candidates aborts the pass.
pub async fn run_sweep_at(
    repo: &dyn AlarmRepository,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<SweepOutcome>> {
    let candidates = repo.alarms_with_status(&state_machine::ESCALATABLE).await?;
    let mut escalated = Vec::new();

    for alarm in candidates {
        if policy.limit_minutes(alarm.status).is_none() {
            continue;
        }
        match escalate_if_breached(repo, policy, alarm.id, now).await {
            Ok(Some(outcome)) => {
                info!(
                    alarm_id = %outcome.alarm_id,
                    previous_status = %outcome.previous_status,
                    elapsed_minutes = outcome.elapsed_minutes,
                    "Alarm auto-escalated"
                );
                escalated.push(outcome);
            }
            Ok(None) => {}
            Err(WorkflowError::Transition(e)) => {
                debug!(alarm_id = %alarm.id, "Skipped by concurrent change: {}", e);
            }
            Err(e) => {
                error!(alarm_id = %alarm.id, "SLA check failed: {}", e);
            }
        }
    }

    Ok(escalated)
}

/// Runs the sweep every `interval` until the process stops.
pub async fn start_sweep_scheduler(
    repo: Arc<dyn AlarmRepository>,
    policy: SlaPolicy,
    interval: Duration,
) {
    info!("SLA sweep scheduled every {} seconds", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match run_sweep(repo.as_ref(), &policy).await {
            Ok(escalated) if escalated.is_empty() => debug!("SLA sweep: nothing to escalate"),
            Ok(escalated) => info!("SLA sweep escalated {} alarm(s)", escalated.len()),
            Err(e) => error!("SLA sweep failed: {}", e),
        }
    }
}
