use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::alarm::{AlarmStatus, Criticality};

pub const SLA_EXCEEDED_REASON: &str = "SLA exceeded";

/// Every event the audit ledger can record, with its payload.
///
/// Serialised adjacently: the variant name becomes the `action` column and
/// the fields become the `meta` JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "meta", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmEvent {
    #[serde(rename_all = "camelCase")]
    AlarmCreated {
        chainage_id: Uuid,
        chainage_value: f64,
        criticality: Criticality,
    },
    #[serde(rename_all = "camelCase")]
    AlarmAssigned {
        assignment_id: Uuid,
        assigned_to: Uuid,
        assigned_by: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    AlarmSelfAssigned {
        assignment_id: Uuid,
        assigned_to: Uuid,
        assigned_by: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    AlarmReassigned {
        assignment_id: Uuid,
        assigned_to: Uuid,
        assigned_by: Uuid,
        superseded: Vec<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    AssignmentAccepted { assignment_id: Uuid },
    #[serde(rename_all = "camelCase")]
    VerificationSubmitted {
        verification_id: Uuid,
        distance: f64,
        geo_mismatch: bool,
        evidence_count: usize,
    },
    AlarmVerified {},
    AlarmMarkedFalse {},
    #[serde(rename_all = "camelCase")]
    AlarmClosed { previous_status: AlarmStatus },
    #[serde(rename_all = "camelCase")]
    AlarmEscalated {
        escalated_by: Uuid,
        previous_status: AlarmStatus,
    },
    #[serde(rename_all = "camelCase")]
    AlarmAutoEscalated {
        reason: String,
        elapsed_minutes: i64,
        previous_status: AlarmStatus,
    },
}

impl AlarmEvent {
    pub fn action(&self) -> &'static str {
        match self {
            AlarmEvent::AlarmCreated { .. } => "ALARM_CREATED",
            AlarmEvent::AlarmAssigned { .. } => "ALARM_ASSIGNED",
            AlarmEvent::AlarmSelfAssigned { .. } => "ALARM_SELF_ASSIGNED",
            AlarmEvent::AlarmReassigned { .. } => "ALARM_REASSIGNED",
            AlarmEvent::AssignmentAccepted { .. } => "ASSIGNMENT_ACCEPTED",
            AlarmEvent::VerificationSubmitted { .. } => "VERIFICATION_SUBMITTED",
            AlarmEvent::AlarmVerified {} => "ALARM_VERIFIED",
            AlarmEvent::AlarmMarkedFalse {} => "ALARM_MARKED_FALSE",
            AlarmEvent::AlarmClosed { .. } => "ALARM_CLOSED",
            AlarmEvent::AlarmEscalated { .. } => "ALARM_ESCALATED",
            AlarmEvent::AlarmAutoEscalated { .. } => "ALARM_AUTO_ESCALATED",
        }
    }

    /// The `meta` document stored next to the action.
    pub fn meta(&self) -> anyhow::Result<Value> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("meta")
            .map(Value::take)
            .unwrap_or_else(|| json!({})))
    }

    pub fn from_parts(action: &str, meta: Value) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(json!({ "action": action, "meta": meta }))?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub event: AlarmEvent,
    /// None for system-triggered entries.
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct LogEntryRow {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub meta: Json<Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LogEntryRow> for LogEntry {
    type Error = anyhow::Error;

    fn try_from(row: LogEntryRow) -> Result<Self, Self::Error> {
        Ok(LogEntry {
            id: row.id,
            alarm_id: row.alarm_id,
            event: AlarmEvent::from_parts(&row.action, row.meta.0)?,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}
