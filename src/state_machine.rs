//! Alarm status graph. `can_transition` is the only place that knows which
//! edges exist; every workflow and the SLA sweep go through it.

use crate::error::TransitionError;
use crate::models::alarm::AlarmStatus;
use AlarmStatus::*;

const EDGES: [(AlarmStatus, AlarmStatus); 10] = [
    (Unassigned, Assigned),
    (Assigned, InProgress),
    (InProgress, Verified),
    (InProgress, FalseAlarm),
    (Verified, Closed),
    (FalseAlarm, Closed),
    (Unassigned, Escalated),
    (Assigned, Escalated),
    (InProgress, Escalated),
    (Escalated, Assigned),
];

/// Statuses the SLA sweep and manual escalation may act on.
pub const ESCALATABLE: [AlarmStatus; 3] = [Unassigned, Assigned, InProgress];

pub fn can_transition(from: AlarmStatus, to: AlarmStatus) -> bool {
    EDGES.contains(&(from, to))
}

pub fn assert_transition(from: AlarmStatus, to: AlarmStatus) -> Result<(), TransitionError> {
    ensure_open(from)?;
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError::Invalid { from, to })
    }
}

/// Closed alarms accept no further updates of any kind.
pub fn ensure_open(status: AlarmStatus) -> Result<(), TransitionError> {
    if is_terminal(status) {
        Err(TransitionError::Closed)
    } else {
        Ok(())
    }
}

pub fn is_terminal(status: AlarmStatus) -> bool {
    status == Closed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_edge_is_allowed() {
        for (from, to) in EDGES {
            assert!(can_transition(from, to));
            assert!(assert_transition(from, to).is_ok(), "{from} -> {to}");
        }
    }

    #[test]
    fn every_unlisted_pair_is_rejected() {
        for from in AlarmStatus::ALL {
            for to in AlarmStatus::ALL {
                if EDGES.contains(&(from, to)) {
                    continue;
                }
                assert!(!can_transition(from, to));
                assert!(assert_transition(from, to).is_err(), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn closed_is_absorbing() {
        for to in AlarmStatus::ALL {
            assert!(matches!(
                assert_transition(Closed, to),
                Err(TransitionError::Closed)
            ));
        }
    }

    #[test]
    fn created_is_never_a_target() {
        for from in AlarmStatus::ALL {
            assert!(!can_transition(from, Created));
        }
    }

    #[test]
    fn rejection_message_names_both_statuses() {
        let err = assert_transition(Assigned, Verified).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid alarm status transition: ASSIGNED → VERIFIED"
        );
        assert_eq!(
            TransitionError::Closed.to_string(),
            "Alarm is closed; no further updates allowed"
        );
    }
}
