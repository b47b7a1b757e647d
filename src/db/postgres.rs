use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use super::{queries, AlarmRepository, AlarmTx, ChainageDirectory, DbPool};
use crate::models::alarm::{Alarm, AlarmRow, AlarmStatus};
use crate::models::assignment::{Assignment, AssignmentRow};
use crate::models::chainage::{Chainage, Role};
use crate::models::log_entry::{LogEntry, LogEntryRow};
use crate::models::verification::{EvidenceRef, GeoPoint, Verification, VerificationRow};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AlarmRepository for PgStore {
    async fn begin(&self) -> Result<Box<dyn AlarmTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_alarm(&self, alarm_id: Uuid) -> Result<Option<Alarm>> {
        let row = sqlx::query_as::<_, AlarmRow>(queries::SELECT_ALARM)
            .bind(alarm_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Alarm::try_from).transpose()
    }

    async fn alarms_with_status(&self, statuses: &[AlarmStatus]) -> Result<Vec<Alarm>> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let mut rows = sqlx::query_as::<_, AlarmRow>(queries::SELECT_ALARMS_BY_STATUS)
            .bind(names)
            .fetch(&self.pool);

        let mut alarms = Vec::new();
        while let Some(row) = rows.try_next().await? {
            alarms.push(Alarm::try_from(row)?);
        }
        Ok(alarms)
    }

    async fn assignments_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<Assignment>> {
        sqlx::query_as::<_, AssignmentRow>(queries::SELECT_ASSIGNMENTS_FOR_ALARM)
            .bind(alarm_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Assignment::try_from)
            .collect()
    }

    async fn logs_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<LogEntry>> {
        sqlx::query_as::<_, LogEntryRow>(queries::SELECT_LOGS_FOR_ALARM)
            .bind(alarm_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LogEntry::try_from)
            .collect()
    }

    async fn verifications_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<Verification>> {
        let rows = sqlx::query_as::<_, VerificationRow>(queries::SELECT_VERIFICATIONS_FOR_ALARM)
            .bind(alarm_id)
            .fetch_all(&self.pool)
            .await?;

        let mut verifications = Vec::with_capacity(rows.len());
        for row in rows {
            let evidence = sqlx::query(queries::SELECT_EVIDENCE_FOR_VERIFICATION)
                .bind(row.id)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|r| -> Result<EvidenceRef> {
                    let kind: String = r.try_get("evidence_type")?;
                    Ok(EvidenceRef {
                        url: r.try_get("url")?,
                        kind: kind.parse()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;


            verifications.push(Verification {
                id: row.id,
                alarm_id: row.alarm_id,
                verified_by: row.verified_by,
                location: GeoPoint::new(row.lat, row.lon),
                distance_meters: row.distance,
                geo_mismatch: row.geo_mismatch,
                remarks: row.remarks,
                evidence,
                verified_at: row.verified_at,
            });
        }
        Ok(verifications)
    }
}

#[async_trait]
impl AlarmTx for PgTx {
    async fn lock_alarm(&mut self, alarm_id: Uuid) -> Result<Option<Alarm>> {
        let row = sqlx::query_as::<_, AlarmRow>(queries::SELECT_ALARM_FOR_UPDATE)
            .bind(alarm_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Alarm::try_from).transpose()
    }

    async fn insert_alarm(&mut self, alarm: &Alarm) -> Result<()> {
        sqlx::query(queries::INSERT_ALARM)
            .bind(alarm.id)
            .bind(alarm.status.as_str())
            .bind(alarm.criticality.as_str())
            .bind(&alarm.alarm_type)
            .bind(alarm.latitude)
            .bind(alarm.longitude)
            .bind(alarm.chainage_id)
            .bind(alarm.chainage_value)
            .bind(alarm.created_by)
            .bind(alarm.incident_time)
            .bind(alarm.created_at)
            .bind(alarm.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_alarm_status(
        &mut self,
        alarm_id: Uuid,
        status: AlarmStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(queries::UPDATE_ALARM_STATUS)
            .bind(alarm_id)
            .bind(status.as_str())
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await?;
        anyhow::ensure!(result.rows_affected() == 1, "alarm {} vanished", alarm_id);
        Ok(())
    }

    async fn find_assignment(&mut self, assignment_id: Uuid) -> Result<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(queries::SELECT_ASSIGNMENT)
            .bind(assignment_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Assignment::try_from).transpose()
    }

    async fn active_assignment(&mut self, alarm_id: Uuid) -> Result<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(queries::SELECT_ACTIVE_ASSIGNMENT)
            .bind(alarm_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Assignment::try_from).transpose()
    }

    async fn insert_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        sqlx::query(queries::INSERT_ASSIGNMENT)
            .bind(assignment.id)
            .bind(assignment.alarm_id)
            .bind(assignment.responder_id)
            .bind(assignment.supervisor_id)
            .bind(assignment.status.as_str())
            .bind(assignment.assigned_at)
            .bind(assignment.accepted_at)
            .bind(assignment.completed_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        sqlx::query(queries::UPDATE_ASSIGNMENT)
            .bind(assignment.id)
            .bind(assignment.status.as_str())
            .bind(assignment.accepted_at)
            .bind(assignment.completed_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn supersede_open_assignments(
        &mut self,
        alarm_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(queries::SUPERSEDE_OPEN_ASSIGNMENTS)
            .bind(alarm_id)
            .bind(at)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(Into::into))
            .collect()
    }

    async fn insert_verification(&mut self, verification: &Verification) -> Result<()> {
        sqlx::query(queries::INSERT_VERIFICATION)
            .bind(verification.id)
            .bind(verification.alarm_id)
            .bind(verification.verified_by)
            .bind(verification.location.latitude)
            .bind(verification.location.longitude)
            .bind(verification.distance_meters)
            .bind(verification.geo_mismatch)
            .bind(&verification.remarks)
            .bind(verification.verified_at)
            .execute(&mut *self.tx)
            .await?;

        for (position, evidence) in verification.evidence.iter().enumerate() {
            sqlx::query(queries::INSERT_EVIDENCE)
                .bind(verification.id)
                .bind(position as i32)
                .bind(&evidence.url)
                .bind(evidence.kind.as_str())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn insert_log(&mut self, entry: &LogEntry) -> Result<()> {
        sqlx::query(queries::INSERT_LOG)
            .bind(entry.id)
            .bind(entry.alarm_id)
            .bind(entry.event.action())
            .bind(entry.actor_id)
            .bind(Json(entry.event.meta()?))
            .bind(entry.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ChainageDirectory for PgStore {
    async fn resolve_chainage(&self, value_km: f64) -> Result<Option<Chainage>> {
        let chainage = sqlx::query_as::<_, Chainage>(queries::SELECT_CHAINAGE_FOR_VALUE)
            .bind(value_km)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chainage)
    }

    async fn is_mapped(&self, user_id: Uuid, chainage_id: Uuid) -> Result<bool> {
        let mapped: bool = sqlx::query_scalar(queries::SELECT_USER_CHAINAGE_MAPPED)
            .bind(user_id)
            .bind(chainage_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(mapped)
    }

    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>> {
        let role: Option<String> = sqlx::query_scalar(queries::SELECT_USER_ROLE)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        role.map(|r| r.parse()).transpose()
    }
}
