use thiserror::Error;
use uuid::Uuid;

use crate::models::alarm::AlarmStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Alarm is closed; no further updates allowed")]
    Closed,
    #[error("Invalid alarm status transition: {from} → {to}")]
    Invalid { from: AlarmStatus, to: AlarmStatus },
}

/// Failure shape shared by every workflow operation.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("Not authorized: {0}")]
    Authorization(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("{0}")]
    Precondition(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn alarm_not_found(id: Uuid) -> Self {
        WorkflowError::NotFound { entity: "Alarm", id }
    }

    pub fn assignment_not_found(id: Uuid) -> Self {
        WorkflowError::NotFound {
            entity: "Assignment",
            id,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
