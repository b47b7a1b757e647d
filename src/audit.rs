use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::AlarmTx;
use crate::models::log_entry::{AlarmEvent, LogEntry};

/// Appends one immutable log row inside the caller's transaction, so the
/// entry commits or rolls back together with the mutation it records.
pub async fn append(
    tx: &mut dyn AlarmTx,
    alarm_id: Uuid,
    event: AlarmEvent,
    actor_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> anyhow::Result<LogEntry> {
    let entry = LogEntry {
        id: Uuid::new_v4(),
        alarm_id,
        event,
        actor_id,
        created_at: at,
    };
    tx.insert_log(&entry).await?;
    Ok(entry)
}
