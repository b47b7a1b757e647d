pub mod alarm_intake;
pub mod assignment;
pub mod decision;
pub mod sla_sweep;
pub mod verification;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::audit;
use crate::db::AlarmTx;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::alarm::{Alarm, AlarmStatus};
use crate::models::chainage::Actor;
use crate::models::log_entry::AlarmEvent;
use crate::state_machine;

/// Locks the alarm for the rest of the transaction.
pub(crate) async fn lock_alarm(tx: &mut dyn AlarmTx, alarm_id: Uuid) -> WorkflowResult<Alarm> {
    tx.lock_alarm(alarm_id)
        .await?
        .ok_or_else(|| WorkflowError::alarm_not_found(alarm_id))
}

/// Validates `alarm.status -> to`, writes the new status and records `event`.
/// Every status change in the service goes through here.
pub(crate) async fn apply_transition(
    tx: &mut dyn AlarmTx,
    alarm: &Alarm,
    to: AlarmStatus,
    event: AlarmEvent,
    actor_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> WorkflowResult<()> {
    state_machine::assert_transition(alarm.status, to)?;
    tx.update_alarm_status(alarm.id, to, at).await?;
    let entry = audit::append(tx, alarm.id, event, actor_id, at).await?;

    info!(
        alarm_id = %alarm.id,
        from = %alarm.status,
        to = %to,
        action = entry.event.action(),
        actor = ?actor_id,
        "Alarm status changed"
    );
    Ok(())
}

pub(crate) fn require_dispatcher(actor: &Actor) -> WorkflowResult<()> {
    if actor.role.can_dispatch() {
        Ok(())
    } else {
        Err(WorkflowError::Authorization(format!(
            "role {:?} cannot dispatch alarms",
            actor.role
        )))
    }
}

pub(crate) fn require_decider(actor: &Actor) -> WorkflowResult<()> {
    if actor.role.can_decide() {
        Ok(())
    } else {
        Err(WorkflowError::Authorization(format!(
            "role {:?} cannot adjudicate alarms",
            actor.role
        )))
    }
}
