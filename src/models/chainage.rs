use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// A linear segment of the network, `start_km..=end_km`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Chainage {
    pub id: Uuid,
    pub name: String,
    pub start_km: f64,
    pub end_km: f64,
}

impl Chainage {
    pub fn contains(&self, value_km: f64) -> bool {
        self.start_km <= value_km && value_km <= self.end_km
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Operator,
    Supervisor,
    Rmp,
    Er,
}

impl Role {
    pub fn is_responder(&self) -> bool {
        matches!(self, Role::Rmp | Role::Er)
    }

    /// May assign, reassign and manually escalate.
    pub fn can_dispatch(&self) -> bool {
        matches!(self, Role::Admin | Role::Operator | Role::Supervisor)
    }

    /// May adjudicate and close alarms.
    pub fn can_decide(&self) -> bool {
        matches!(self, Role::Admin | Role::Operator)
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "OPERATOR" => Ok(Role::Operator),
            "SUPERVISOR" => Ok(Role::Supervisor),
            "RMP" => Ok(Role::Rmp),
            "ER" => Ok(Role::Er),
            other => Err(anyhow::anyhow!("unknown role '{}'", other)),
        }
    }
}

/// Already-authenticated caller of a workflow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}
