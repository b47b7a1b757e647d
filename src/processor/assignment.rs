use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::{apply_transition, lock_alarm, require_dispatcher};
use crate::db::{AlarmRepository, AlarmTx, ChainageDirectory};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::alarm::{Alarm, AlarmStatus};
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::models::chainage::Actor;
use crate::models::log_entry::AlarmEvent;
use crate::state_machine;

/// Who made an assignment, which decides the logged event and whether a
/// supervisor is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Supervised,
    SelfAssigned,
}

impl AssignmentKind {
    fn for_actor(actor: &Actor, responder_id: Uuid) -> WorkflowResult<Self> {
        if actor.role.is_responder() && actor.id == responder_id {
            Ok(AssignmentKind::SelfAssigned)
        } else {
            require_dispatcher(actor)?;
            Ok(AssignmentKind::Supervised)
        }
    }
}

/// The responder must hold a responder role and be mapped to the alarm's chainage.
async fn authorize_responder(
    directory: &dyn ChainageDirectory,
    responder_id: Uuid,
    alarm: &Alarm,
) -> WorkflowResult<()> {
    match directory.role_of(responder_id).await? {
        Some(role) if role.is_responder() => {}
        _ => {
            return Err(WorkflowError::Authorization(format!(
                "user {} is not a responder",
                responder_id
            )))
        }
    }
    if !directory.is_mapped(responder_id, alarm.chainage_id).await? {
        return Err(WorkflowError::Authorization(format!(
            "responder {} is not mapped to chainage {}",
            responder_id, alarm.chainage_id
        )));
    }
    Ok(())
}

/// Assigns an UNASSIGNED alarm. A responder assigning themself produces a
/// self-assignment with no supervisor.
pub async fn create_assignment(
    repo: &dyn AlarmRepository,
    directory: &dyn ChainageDirectory,
    alarm_id: Uuid,
    responder_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Assignment> {
    let kind = AssignmentKind::for_actor(actor, responder_id)?;
    let now = Utc::now();

    let mut tx = repo.begin().await?;
    let alarm = lock_alarm(tx.as_mut(), alarm_id).await?;

    state_machine::assert_transition(alarm.status, AlarmStatus::Assigned)?;
    if alarm.status != AlarmStatus::Unassigned {
        return Err(WorkflowError::Precondition(format!(
            "Alarm is {}, not UNASSIGNED; escalated alarms are reassigned",
            alarm.status
        )));
    }
    authorize_responder(directory, responder_id, &alarm).await?;

    let supervisor_id = match kind {
        AssignmentKind::Supervised => Some(actor.id),
        AssignmentKind::SelfAssigned => None,
    };
    let assignment = Assignment::pending(alarm.id, responder_id, supervisor_id, now);
    tx.insert_assignment(&assignment).await?;

    let event = match kind {
        AssignmentKind::Supervised => AlarmEvent::AlarmAssigned {
            assignment_id: assignment.id,
            assigned_to: responder_id,
            assigned_by: actor.id,
        },
        AssignmentKind::SelfAssigned => AlarmEvent::AlarmSelfAssigned {
            assignment_id: assignment.id,
            assigned_to: responder_id,
            assigned_by: actor.id,
        },
    };
    apply_transition(tx.as_mut(), &alarm, AlarmStatus::Assigned, event, Some(actor.id), now).await?;
    tx.commit().await?;

    info!(
        alarm_id = %alarm.id,
        assignment_id = %assignment.id,
        responder = %responder_id,
        kind = ?kind,
        "Assignment created"
    );
    Ok(assignment)
}

/// Accepts a pending assignment on behalf of its own responder only.
pub async fn accept_assignment(
    repo: &dyn AlarmRepository,
    assignment_id: Uuid,
    responder_id: Uuid,
) -> WorkflowResult<Assignment> {
    let now = Utc::now();
    let mut tx = repo.begin().await?;

    let alarm_id = tx
        .find_assignment(assignment_id)
        .await?
        .ok_or_else(|| WorkflowError::assignment_not_found(assignment_id))?
        .alarm_id;
    let alarm = lock_alarm(tx.as_mut(), alarm_id).await?;

    // Re-read under the alarm lock; a reassignment may have superseded it.
    let mut assignment = tx
        .find_assignment(assignment_id)
        .await?
        .ok_or_else(|| WorkflowError::assignment_not_found(assignment_id))?;

    if assignment.responder_id != responder_id {
        return Err(WorkflowError::Authorization(format!(
            "assignment {} belongs to another responder",
            assignment_id
        )));
    }
    if assignment.status != AssignmentStatus::Pending {
        return Err(WorkflowError::Precondition(format!(
            "Assignment is {}, not PENDING",
            assignment.status.as_str()
        )));
    }
    let is_active = tx
        .active_assignment(alarm.id)
        .await?
        .is_some_and(|active| active.id == assignment.id);
    if !is_active {
        return Err(WorkflowError::Precondition(
            "Assignment is no longer the active assignment for this alarm".to_string(),
        ));
    }

    state_machine::ensure_open(alarm.status)?;
    apply_transition(
        tx.as_mut(),
        &alarm,
        AlarmStatus::InProgress,
        AlarmEvent::AssignmentAccepted {
            assignment_id: assignment.id,
        },
        Some(responder_id),
        now,
    )
    .await?;

    assignment.status = AssignmentStatus::Accepted;
    assignment.accepted_at = Some(now);
    tx.update_assignment(&assignment).await?;
    tx.commit().await?;

    info!(alarm_id = %alarm.id, assignment_id = %assignment.id, "Assignment accepted");
    Ok(assignment)
}

/// Hands an ESCALATED alarm to a new responder. Every open assignment on
/// the alarm is marked superseded in the same transaction.
pub async fn create_reassignment(
    repo: &dyn AlarmRepository,
    directory: &dyn ChainageDirectory,
    alarm_id: Uuid,
    responder_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Assignment> {
    require_dispatcher(actor)?;
    let now = Utc::now();

    let mut tx = repo.begin().await?;
    let alarm = lock_alarm(tx.as_mut(), alarm_id).await?;

    state_machine::ensure_open(alarm.status)?;
    if alarm.status != AlarmStatus::Escalated {
        return Err(WorkflowError::Precondition(format!(
            "Alarm is {}; only ESCALATED alarms can be reassigned",
            alarm.status
        )));
    }
    authorize_responder(directory, responder_id, &alarm).await?;

    let superseded = tx.supersede_open_assignments(alarm.id, now).await?;
    let assignment = Assignment::pending(alarm.id, responder_id, Some(actor.id), now);
    tx.insert_assignment(&assignment).await?;

    apply_transition(
        tx.as_mut(),
        &alarm,
        AlarmStatus::Assigned,
        AlarmEvent::AlarmReassigned {
            assignment_id: assignment.id,
            assigned_to: responder_id,
            assigned_by: actor.id,
            superseded: superseded.clone(),
        },
        Some(actor.id),
        now,
    )
    .await?;
    tx.commit().await?;

    info!(
        alarm_id = %alarm.id,
        assignment_id = %assignment.id,
        responder = %responder_id,
        superseded = superseded.len(),
        "Alarm reassigned"
    );
    Ok(assignment)
}

/// Marks an accepted assignment completed inside the caller's transaction.
/// The alarm status is left alone.
pub async fn complete_assignment(
    tx: &mut dyn AlarmTx,
    assignment_id: Uuid,
    at: DateTime<Utc>,
) -> WorkflowResult<Assignment> {
    let mut assignment = tx
        .find_assignment(assignment_id)
        .await?
        .ok_or_else(|| WorkflowError::assignment_not_found(assignment_id))?;

    if assignment.status != AssignmentStatus::Accepted {
        return Err(WorkflowError::Precondition(format!(
            "Assignment is {}, not ACCEPTED",
            assignment.status.as_str()
        )));
    }

    assignment.status = AssignmentStatus::Completed;
    assignment.completed_at = Some(at);
    tx.update_assignment(&assignment).await?;
    Ok(assignment)
}
