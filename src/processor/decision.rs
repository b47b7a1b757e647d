use chrono::Utc;
use uuid::Uuid;

use super::{apply_transition, lock_alarm, require_decider, require_dispatcher};
use crate::db::AlarmRepository;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::alarm::{Alarm, AlarmStatus};
use crate::models::chainage::Actor;
use crate::models::log_entry::AlarmEvent;
use crate::state_machine;

async fn decide(
    repo: &dyn AlarmRepository,
    alarm_id: Uuid,
    actor: &Actor,
    to: AlarmStatus,
    event: AlarmEvent,
) -> WorkflowResult<Alarm> {
    require_decider(actor)?;
    let now = Utc::now();

    let mut tx = repo.begin().await?;
    let mut alarm = lock_alarm(tx.as_mut(), alarm_id).await?;
    apply_transition(tx.as_mut(), &alarm, to, event, Some(actor.id), now).await?;
    tx.commit().await?;

    alarm.status = to;
    alarm.updated_at = now;
    Ok(alarm)
}

/// Operator confirms the alarm was real.
pub async fn mark_verified(
    repo: &dyn AlarmRepository,
    alarm_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Alarm> {
    decide(repo, alarm_id, actor, AlarmStatus::Verified, AlarmEvent::AlarmVerified {}).await
}

/// Operator rules the alarm a false alarm.
pub async fn mark_false_alarm(
    repo: &dyn AlarmRepository,
    alarm_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Alarm> {
    decide(repo, alarm_id, actor, AlarmStatus::FalseAlarm, AlarmEvent::AlarmMarkedFalse {}).await
}

/// Closes an adjudicated alarm. Closed alarms never change again.
pub async fn close_alarm(
    repo: &dyn AlarmRepository,
    alarm_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Alarm> {
    require_decider(actor)?;
    let now = Utc::now();

    let mut tx = repo.begin().await?;
    let mut alarm = lock_alarm(tx.as_mut(), alarm_id).await?;

    state_machine::ensure_open(alarm.status)?;
    if !matches!(alarm.status, AlarmStatus::Verified | AlarmStatus::FalseAlarm) {
        return Err(WorkflowError::Precondition(format!(
            "Alarm must be VERIFIED or FALSE_ALARM to close; it is {}",
            alarm.status
        )));
    }

    apply_transition(
        tx.as_mut(),
        &alarm,
        AlarmStatus::Closed,
        AlarmEvent::AlarmClosed {
            previous_status: alarm.status,
        },
        Some(actor.id),
        now,
    )
    .await?;
    tx.commit().await?;

    alarm.status = AlarmStatus::Closed;
    alarm.updated_at = now;
    Ok(alarm)
}

/// Manual escalation by a dispatcher; the SLA sweep is the automatic path.
pub async fn escalate_alarm(
    repo: &dyn AlarmRepository,
    alarm_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Alarm> {
    require_dispatcher(actor)?;
    let now = Utc::now();

    let mut tx = repo.begin().await?;
    let mut alarm = lock_alarm(tx.as_mut(), alarm_id).await?;

    state_machine::ensure_open(alarm.status)?;
    if !state_machine::ESCALATABLE.contains(&alarm.status) {
        return Err(WorkflowError::Precondition(format!(
            "Alarm is {}; only UNASSIGNED, ASSIGNED or IN_PROGRESS alarms can be escalated",
            alarm.status
        )));
    }

    apply_transition(
        tx.as_mut(),
        &alarm,
        AlarmStatus::Escalated,
        AlarmEvent::AlarmEscalated {
            escalated_by: actor.id,
            previous_status: alarm.status,
        },
        Some(actor.id),
        now,
    )
    .await?;
    tx.commit().await?;

    alarm.status = AlarmStatus::Escalated;
    alarm.updated_at = now;
    Ok(alarm)
}
