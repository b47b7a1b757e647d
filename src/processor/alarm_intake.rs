use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit;
use crate::db::{AlarmRepository, ChainageDirectory};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::alarm::{Alarm, AlarmStatus, Criticality};
use crate::models::log_entry::AlarmEvent;
use crate::models::message::AlarmMessage;
use crate::models::verification::GeoPoint;

#[derive(Debug, Clone)]
pub struct NewAlarm {
    pub id: Uuid,
    pub alarm_type: String,
    pub criticality: Criticality,
    pub location: Option<GeoPoint>,
    pub chainage_value: f64,
    pub created_by: Option<Uuid>,
    pub incident_time: DateTime<Utc>,
}

/// Stores a new alarm, already UNASSIGNED, with its single ALARM_CREATED
/// log row. Fails with a precondition error if the id is already taken.
pub async fn create_alarm(
    repo: &dyn AlarmRepository,
    directory: &dyn ChainageDirectory,
    new_alarm: NewAlarm,
    now: DateTime<Utc>,
) -> WorkflowResult<Alarm> {
    if new_alarm.alarm_type.trim().is_empty() {
        return Err(WorkflowError::Validation("alarm type is required".to_string()));
    }
    if let Some(location) = new_alarm.location {
        if !location.is_valid() {
            return Err(WorkflowError::Validation(format!(
                "coordinates out of range: {}, {}",
                location.latitude, location.longitude
            )));
        }
    }

    let chainage = directory
        .resolve_chainage(new_alarm.chainage_value)
        .await?
        .ok_or_else(|| {
            WorkflowError::Validation(format!(
                "no chainage covers {} km",
                new_alarm.chainage_value
            ))
        })?;

    let mut tx = repo.begin().await?;

    if tx.lock_alarm(new_alarm.id).await?.is_some() {
        return Err(WorkflowError::Precondition(format!(
            "Alarm {} already exists",
            new_alarm.id
        )));
    }

    let alarm = Alarm {
        id: new_alarm.id,
        status: AlarmStatus::Unassigned,
        criticality: new_alarm.criticality,
        alarm_type: new_alarm.alarm_type,
        latitude: new_alarm.location.map(|l| l.latitude),
        longitude: new_alarm.location.map(|l| l.longitude),
        chainage_id: chainage.id,
        chainage_value: new_alarm.chainage_value,
        created_by: new_alarm.created_by,
        incident_time: new_alarm.incident_time,
        created_at: now,
        updated_at: now,
    };

    tx.insert_alarm(&alarm).await?;
    audit::append(
        tx.as_mut(),
        alarm.id,
        AlarmEvent::AlarmCreated {
            chainage_id: chainage.id,
            chainage_value: alarm.chainage_value,
            criticality: alarm.criticality,
        },
        alarm.created_by,
        now,
    )
    .await?;
    tx.commit().await?;

    info!(
        alarm_id = %alarm.id,
        chainage = %chainage.name,
        criticality = alarm.criticality.as_str(),
        "Alarm created"
    );
    Ok(alarm)
}

/// Maps a gateway payload onto a [`NewAlarm`]. `None` means the payload is
/// unusable; the reason has been logged.
pub fn parse_alarm_message(message: &AlarmMessage, now: DateTime<Utc>) -> Option<NewAlarm> {
    let Some(id) = message.alarm_id() else {
        warn!("Message uuid '{}' is not a valid UUID, skipping", message.uuid);
        return None;
    };

    let Some(chainage_value) = message.data.chainage else {
        warn!("Message {} missing CHAINAGE, skipping", id);
        return None;
    };

    let Some(alarm_type) = message
        .data
        .alarm_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        warn!("Message {} missing ALARM_TYPE, skipping", id);
        return None;
    };

    let criticality = match message.data.criticality.as_deref() {
        None => Criticality::Medium,
        Some(raw) => match raw.parse() {
            Ok(c) => c,
            Err(e) => {
                warn!("Message {}: {}, skipping", id, e);
                return None;
            }
        },
    };

    let location = match (message.data.latitude, message.data.longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    };

    let incident_time = message.incident_time().unwrap_or_else(|| {
        warn!("Message {} has no usable INCIDENT_DATETIME, using receive time", id);
        now
    });

    Some(NewAlarm {
        id,
        alarm_type: alarm_type.to_uppercase(),
        criticality,
        location,
        chainage_value,
        created_by: message.created_by(),
        incident_time,
    })
}

/// Handles one raw payload from the alarm topic. Malformed payloads and
/// business rejections are logged and dropped; storage failures propagate.
pub async fn process_message(
    repo: &dyn AlarmRepository,
    directory: &dyn ChainageDirectory,
    payload: &[u8],
) -> anyhow::Result<()> {
    let message: AlarmMessage = match serde_json::from_slice(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return Ok(());
        }
    };

    let now = Utc::now();
    let Some(new_alarm) = parse_alarm_message(&message, now) else {
        return Ok(());
    };
    let alarm_id = new_alarm.id;

    match create_alarm(repo, directory, new_alarm, now).await {
        Ok(_) => Ok(()),
        Err(WorkflowError::Storage(e)) => Err(e),
        Err(WorkflowError::Precondition(reason)) => {
            info!("Ignored redelivered alarm {}: {}", alarm_id, reason);
            Ok(())
        }
        Err(e) => {
            warn!("Rejected alarm {}: {}", alarm_id, e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::fixtures::World;

    fn payload(uuid: Uuid, chainage: &str) -> Vec<u8> {
        format!(
            r#"{{
                "data": {{
                    "ALARM_TYPE": "intrusion",
                    "CRITICALITY": "HIGH",
                    "INCIDENT_DATETIME": "2025-11-29 06:15:15",
                    "LATITUD": "+20.652494",
                    "LONGITUD": "-100.391404",
                    "CHAINAGE": "{chainage}"
                }},
                "uuid": "{uuid}"
            }}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn created_alarm_is_unassigned_with_one_creation_log() {
        let world = World::new();
        let id = Uuid::new_v4();

        process_message(&world.store, &world.directory, &payload(id, "14.25"))
            .await
            .unwrap();

        let state = world.store.snapshot().await;
        let alarm = &state.alarms[&id];
        assert_eq!(alarm.status, AlarmStatus::Unassigned);
        assert_eq!(alarm.chainage_id, world.chainage.id);
        assert_eq!(alarm.alarm_type, "INTRUSION");

        let logs = world.logs_of(id).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event.action(), "ALARM_CREATED");
    }

    #[tokio::test]
    async fn redelivery_does_not_duplicate() {
        let world = World::new();
        let id = Uuid::new_v4();
        let bytes = payload(id, "14.25");

        process_message(&world.store, &world.directory, &bytes).await.unwrap();
        process_message(&world.store, &world.directory, &bytes).await.unwrap();

        assert_eq!(world.store.snapshot().await.alarms.len(), 1);
        assert_eq!(world.logs_of(id).await.len(), 1);
    }

    #[tokio::test]
    async fn position_outside_every_chainage_is_rejected() {
        let world = World::new();

        process_message(&world.store, &world.directory, &payload(Uuid::new_v4(), "42.0"))
            .await
            .unwrap();
        process_message(&world.store, &world.directory, b"not json")
            .await
            .unwrap();

        let state = world.store.snapshot().await;
        assert!(state.alarms.is_empty());
        assert!(state.logs.is_empty());
    }

    #[tokio::test]
    async fn invalid_coordinates_fail_validation() {
        let world = World::new();
        let new_alarm = NewAlarm {
            id: Uuid::new_v4(),
            alarm_type: "FIRE".to_string(),
            criticality: Criticality::Critical,
            location: Some(GeoPoint::new(91.0, 0.0)),
            chainage_value: 12.0,
            created_by: None,
            incident_time: Utc::now(),
        };

        let err = create_alarm(&world.store, &world.directory, new_alarm, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
