use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Completed,
    /// Replaced by a reassignment. Kept for audit, never mutated again.
    Superseded,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::Accepted => "ACCEPTED",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Superseded => "SUPERSEDED",
        }
    }

    /// Pending and accepted rows compete for "active" on their alarm.
    pub fn is_open(&self) -> bool {
        matches!(self, AssignmentStatus::Pending | AssignmentStatus::Accepted)
    }
}

impl FromStr for AssignmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AssignmentStatus::Pending),
            "ACCEPTED" => Ok(AssignmentStatus::Accepted),
            "COMPLETED" => Ok(AssignmentStatus::Completed),
            "SUPERSEDED" => Ok(AssignmentStatus::Superseded),
            other => Err(anyhow::anyhow!("unknown assignment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub responder_id: Uuid,
    /// None when the responder assigned themself.
    pub supervisor_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn pending(
        alarm_id: Uuid,
        responder_id: Uuid,
        supervisor_id: Option<Uuid>,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alarm_id,
            responder_id,
            supervisor_id,
            status: AssignmentStatus::Pending,
            assigned_at,
            accepted_at: None,
            completed_at: None,
        }
    }
}

/// Most recent open assignment by `assigned_at`. The single place where
/// "active assignment" is decided, shared by every store implementation.
pub fn select_active<'a, I>(assignments: I) -> Option<&'a Assignment>
where
    I: IntoIterator<Item = &'a Assignment>,
{
    assignments
        .into_iter()
        .filter(|a| a.status.is_open())
        .max_by_key(|a| a.assigned_at)
}

#[derive(Debug, FromRow)]
pub struct AssignmentRow {
    pub id: Uuid,
    pub alarm_id: Uuid,
    pub responder_id: Uuid,
    pub supervisor_id: Option<Uuid>,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = anyhow::Error;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(Assignment {
            id: row.id,
            alarm_id: row.alarm_id,
            responder_id: row.responder_id,
            supervisor_id: row.supervisor_id,
            status: row.status.parse()?,
            assigned_at: row.assigned_at,
            accepted_at: row.accepted_at,
            completed_at: row.completed_at,
        })
    }
}
