use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of an alarm. Transitions between these are decided by
/// `state_machine`, never by comparing values at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmStatus {
    /// Transient; alarms are persisted already UNASSIGNED.
    Created,
    Unassigned,
    Assigned,
    InProgress,
    Verified,
    FalseAlarm,
    Escalated,
    Closed,
}

impl AlarmStatus {
    pub const ALL: [AlarmStatus; 8] = [
        AlarmStatus::Created,
        AlarmStatus::Unassigned,
        AlarmStatus::Assigned,
        AlarmStatus::InProgress,
        AlarmStatus::Verified,
        AlarmStatus::FalseAlarm,
        AlarmStatus::Escalated,
        AlarmStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmStatus::Created => "CREATED",
            AlarmStatus::Unassigned => "UNASSIGNED",
            AlarmStatus::Assigned => "ASSIGNED",
            AlarmStatus::InProgress => "IN_PROGRESS",
            AlarmStatus::Verified => "VERIFIED",
            AlarmStatus::FalseAlarm => "FALSE_ALARM",
            AlarmStatus::Escalated => "ESCALATED",
            AlarmStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlarmStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown alarm status '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "LOW",
            Criticality::Medium => "MEDIUM",
            Criticality::High => "HIGH",
            Criticality::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Criticality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Criticality::Low),
            "MEDIUM" => Ok(Criticality::Medium),
            "HIGH" => Ok(Criticality::High),
            "CRITICAL" => Ok(Criticality::Critical),
            other => Err(anyhow::anyhow!("unknown criticality '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub status: AlarmStatus,
    pub criticality: Criticality,
    pub alarm_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub chainage_id: Uuid,
    pub chainage_value: f64,
    pub created_by: Option<Uuid>,
    pub incident_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `alarms` table. Enums are stored as text.
#[derive(Debug, FromRow)]
pub struct AlarmRow {
    pub id: Uuid,
    pub status: String,
    pub criticality: String,
    pub alarm_type: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub chainage_id: Uuid,
    pub chainage_value: f64,
    pub created_by: Option<Uuid>,
    pub incident_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AlarmRow> for Alarm {
    type Error = anyhow::Error;

    fn try_from(row: AlarmRow) -> Result<Self, Self::Error> {
        Ok(Alarm {
            id: row.id,
            status: row.status.parse()?,
            criticality: row.criticality.parse()?,
            alarm_type: row.alarm_type,
            latitude: row.lat,
            longitude: row.lon,
            chainage_id: row.chainage_id,
            chainage_value: row.chainage_value,
            created_by: row.created_by,
            incident_time: row.incident_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
