use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::assignment::complete_assignment;
use super::lock_alarm;
use crate::audit;
use crate::config::VerificationPolicy;
use crate::db::AlarmRepository;
use crate::error::{WorkflowError, WorkflowResult};
use crate::geo;
use crate::models::alarm::AlarmStatus;
use crate::models::assignment::AssignmentStatus;
use crate::models::log_entry::AlarmEvent;
use crate::models::verification::{EvidenceRef, GeoPoint, Verification};
use crate::state_machine;

/// What a responder reports from the field.
#[derive(Debug, Clone)]
pub struct VerificationSubmission {
    pub location: GeoPoint,
    pub remarks: Option<String>,
    /// References already returned by the evidence storage.
    pub evidence: Vec<EvidenceRef>,
}

fn validate(submission: &VerificationSubmission, policy: &VerificationPolicy) -> WorkflowResult<()> {
    if !submission.location.is_valid() {
        return Err(WorkflowError::Validation(format!(
            "coordinates out of range: {}, {}",
            submission.location.latitude, submission.location.longitude
        )));
    }
    if submission.evidence.len() > policy.max_evidence_files {
        return Err(WorkflowError::Validation(format!(
            "at most {} evidence files are accepted, got {}",
            policy.max_evidence_files,
            submission.evidence.len()
        )));
    }
    if submission.evidence.iter().any(|e| e.url.trim().is_empty()) {
        return Err(WorkflowError::Validation(
            "evidence reference without url".to_string(),
        ));
    }
    Ok(())
}

/// Records the responder's field observation and completes their
/// assignment. The alarm stays IN_PROGRESS until an operator decides.
pub async fn submit_verification(
    repo: &dyn AlarmRepository,
    policy: &VerificationPolicy,
    alarm_id: Uuid,
    responder_id: Uuid,
    submission: VerificationSubmission,
) -> WorkflowResult<Verification> {
    validate(&submission, policy)?;
    let now = Utc::now();

    let mut tx = repo.begin().await?;
    let alarm = lock_alarm(tx.as_mut(), alarm_id).await?;
    state_machine::ensure_open(alarm.status)?;

    let assignment = tx.active_assignment(alarm.id).await?.ok_or_else(|| {
        WorkflowError::Precondition("Alarm has no active assignment".to_string())
    })?;
    if assignment.responder_id != responder_id {
        return Err(WorkflowError::Authorization(
            "only the assigned responder can verify this alarm".to_string(),
        ));
    }
    if assignment.status != AssignmentStatus::Accepted {
        return Err(WorkflowError::Precondition(
            "Assignment has not been accepted".to_string(),
        ));
    }
    if alarm.status != AlarmStatus::InProgress {
        return Err(WorkflowError::Precondition(format!(
            "Alarm is {}, not IN_PROGRESS",
            alarm.status
        )));
    }

    let alarm_location = match (alarm.latitude, alarm.longitude) {
        (Some(lat), Some(lon)) if GeoPoint::new(lat, lon).is_valid() => GeoPoint::new(lat, lon),
        _ => {
            return Err(WorkflowError::Precondition(
                "Alarm has no valid coordinates to verify against".to_string(),
            ))
        }
    };

    let distance = geo::great_circle_distance_meters(alarm_location, submission.location);
    let geo_mismatch = geo::is_geo_mismatch(distance, policy.geo_tolerance_meters);

    let verification = Verification {
        id: Uuid::new_v4(),
        alarm_id: alarm.id,
        verified_by: responder_id,
        location: submission.location,
        distance_meters: distance,
        geo_mismatch,
        remarks: submission
            .remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        evidence: submission.evidence,
        verified_at: now,
    };
    tx.insert_verification(&verification).await?;

    audit::append(
        tx.as_mut(),
        alarm.id,
        AlarmEvent::VerificationSubmitted {
            verification_id: verification.id,
            distance,
            geo_mismatch,
            evidence_count: verification.evidence.len(),
        },
        Some(responder_id),
        now,
    )
    .await?;
    complete_assignment(tx.as_mut(), assignment.id, now).await?;
    tx.commit().await?;

    if geo_mismatch {
        warn!(
            alarm_id = %alarm.id,
            distance_meters = distance,
            tolerance_meters = policy.geo_tolerance_meters,
            "Verification location outside tolerance"
        );
    }
    info!(
        alarm_id = %alarm.id,
        verification_id = %verification.id,
        distance_meters = distance,
        "Verification submitted"
    );
    Ok(verification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset_north;
    use crate::models::alarm::Alarm;
    use crate::models::verification::EvidenceType;
    use crate::processor::assignment::{accept_assignment, create_assignment};
    use crate::processor::fixtures::{World, ALARM_LOCATION};

    async fn in_progress(world: &World) -> Alarm {
        let alarm = world.seed_alarm(AlarmStatus::Unassigned, Utc::now()).await;
        let assignment =
            create_assignment(&world.store, &world.directory, alarm.id, world.r1.id, &world.supervisor)
                .await
                .unwrap();
        accept_assignment(&world.store, assignment.id, world.r1.id)
            .await
            .unwrap();
        alarm
    }

    fn at(meters: f64) -> VerificationSubmission {
        VerificationSubmission {
            location: offset_north(ALARM_LOCATION, meters),
            remarks: Some("fence cut near gate".to_string()),
            evidence: vec![EvidenceRef {
                url: "https://evidence.example/1.jpg".to_string(),
                kind: EvidenceType::Image,
            }],
        }
    }

    #[tokio::test]
    async fn verification_completes_assignment_but_keeps_alarm_in_progress() {
        let world = World::new();
        let alarm = in_progress(&world).await;

        let verification = submit_verification(
            &world.store,
            &VerificationPolicy::default(),
            alarm.id,
            world.r1.id,
            at(40.0),
        )
        .await
        .unwrap();

        assert!(!verification.geo_mismatch);
        assert!((verification.distance_meters - 40.0).abs() < 0.01);

        let state = world.store.snapshot().await;
        assert_eq!(state.alarms[&alarm.id].status, AlarmStatus::InProgress);
        assert_eq!(state.assignments[0].status, AssignmentStatus::Completed);
        assert!(state.assignments[0].completed_at.is_some());
        assert_eq!(state.verifications.len(), 1);

        let logs = world.logs_of(alarm.id).await;
        assert_eq!(logs.last().unwrap().event.action(), "VERIFICATION_SUBMITTED");
    }

    #[tokio::test]
    async fn far_location_is_flagged_as_mismatch() {
        let world = World::new();
        let alarm = in_progress(&world).await;

        let verification = submit_verification(
            &world.store,
            &VerificationPolicy::default(),
            alarm.id,
            world.r1.id,
            at(250.0),
        )
        .await
        .unwrap();

        assert!(verification.geo_mismatch);
        match &world.logs_of(alarm.id).await.last().unwrap().event {
            AlarmEvent::VerificationSubmitted { geo_mismatch, .. } => assert!(*geo_mismatch),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn distance_equal_to_tolerance_is_a_match() {
        let world = World::new();
        let alarm = in_progress(&world).await;
        let submission = at(100.0);
        let policy = VerificationPolicy {
            geo_tolerance_meters: geo::great_circle_distance_meters(
                ALARM_LOCATION,
                submission.location,
            ),
            ..VerificationPolicy::default()
        };

        let verification =
            submit_verification(&world.store, &policy, alarm.id, world.r1.id, submission)
                .await
                .unwrap();
        assert!(!verification.geo_mismatch);
    }

    #[tokio::test]
    async fn other_responder_cannot_verify() {
        let world = World::new();
        let alarm = in_progress(&world).await;

        let err = submit_verification(
            &world.store,
            &VerificationPolicy::default(),
            alarm.id,
            world.r2.id,
            at(10.0),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WorkflowError::Authorization(_)));
        assert!(world.store.snapshot().await.verifications.is_empty());
    }

    #[tokio::test]
    async fn pending_assignment_cannot_verify() {
        let world = World::new();
        let alarm = world.seed_alarm(AlarmStatus::Unassigned, Utc::now()).await;
        create_assignment(&world.store, &world.directory, alarm.id, world.r1.id, &world.supervisor)
            .await
            .unwrap();

        let err = submit_verification(
            &world.store,
            &VerificationPolicy::default(),
            alarm.id,
            world.r1.id,
            at(10.0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition(_)));
    }

    #[tokio::test]
    async fn second_verification_has_no_active_assignment() {
        let world = World::new();
        let alarm = in_progress(&world).await;
        let policy = VerificationPolicy::default();

        submit_verification(&world.store, &policy, alarm.id, world.r1.id, at(5.0))
            .await
            .unwrap();
        let err = submit_verification(&world.store, &policy, alarm.id, world.r1.id, at(5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition(_)));
    }

    #[tokio::test]
    async fn alarm_without_coordinates_cannot_be_verified() {
        let world = World::new();
        let alarm = in_progress(&world).await;
        {
            let mut stored = world.store.snapshot().await.alarms[&alarm.id].clone();
            stored.latitude = None;
            world.store.put_alarm(stored).await;
        }

        let err = submit_verification(
            &world.store,
            &VerificationPolicy::default(),
            alarm.id,
            world.r1.id,
            at(5.0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition(_)));
    }

    #[tokio::test]
    async fn too_much_evidence_is_rejected_before_touching_storage() {
        let world = World::new();
        let alarm = in_progress(&world).await;
        let policy = VerificationPolicy {
            max_evidence_files: 1,
            ..VerificationPolicy::default()
        };
        let mut submission = at(5.0);
        submission.evidence.push(EvidenceRef {
            url: "https://evidence.example/2.mp4".to_string(),
            kind: EvidenceType::Video,
        });

        let err = submit_verification(&world.store, &policy, alarm.id, world.r1.id, submission)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(world.store.snapshot().await.assignments[0].status, AssignmentStatus::Accepted);
    }
}
