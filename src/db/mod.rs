use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, Pool, Postgres};
use uuid::Uuid;

use crate::models::alarm::{Alarm, AlarmStatus};
use crate::models::assignment::Assignment;
use crate::models::chainage::{Chainage, Role};
use crate::models::log_entry::LogEntry;
use crate::models::verification::Verification;

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Creates the alarm core tables if they are missing.
pub async fn apply_schema(pool: &DbPool) -> Result<()> {
    pool.execute(queries::SCHEMA).await?;
    Ok(())
}

/// Storage seam for the alarm core. Mutations only happen through an
/// [`AlarmTx`], so a status change and its log row commit together.
#[async_trait]
pub trait AlarmRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AlarmTx>>;

    async fn find_alarm(&self, alarm_id: Uuid) -> Result<Option<Alarm>>;

    /// Snapshot used by the SLA sweep to pick candidates. Each candidate is
    /// re-read under lock before anything is changed.
    async fn alarms_with_status(&self, statuses: &[AlarmStatus]) -> Result<Vec<Alarm>>;

    async fn assignments_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<Assignment>>;

    async fn logs_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<LogEntry>>;

    async fn verifications_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<Verification>>;
}

/// One atomic unit of work. Dropping it without `commit` discards every change.
#[async_trait]
pub trait AlarmTx: Send {
    /// Reads the alarm and holds it until commit; concurrent operations on
    /// the same alarm wait here and then see the committed status.
    async fn lock_alarm(&mut self, alarm_id: Uuid) -> Result<Option<Alarm>>;

    async fn insert_alarm(&mut self, alarm: &Alarm) -> Result<()>;

    async fn update_alarm_status(
        &mut self,
        alarm_id: Uuid,
        status: AlarmStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn find_assignment(&mut self, assignment_id: Uuid) -> Result<Option<Assignment>>;

    /// Most recent pending/accepted assignment of the alarm.
    async fn active_assignment(&mut self, alarm_id: Uuid) -> Result<Option<Assignment>>;

    async fn insert_assignment(&mut self, assignment: &Assignment) -> Result<()>;

    /// Writes status and timestamps of an existing assignment.
    async fn update_assignment(&mut self, assignment: &Assignment) -> Result<()>;

    /// Marks every pending/accepted assignment of the alarm superseded and
    /// returns their ids.
    async fn supersede_open_assignments(
        &mut self,
        alarm_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>>;

    async fn insert_verification(&mut self, verification: &Verification) -> Result<()>;

    async fn insert_log(&mut self, entry: &LogEntry) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Read-only view of the chainage and user tables owned by administration.
#[async_trait]
pub trait ChainageDirectory: Send + Sync {
    /// Chainage whose `start_km..=end_km` covers the value.
    async fn resolve_chainage(&self, value_km: f64) -> Result<Option<Chainage>>;

    async fn is_mapped(&self, user_id: Uuid, chainage_id: Uuid) -> Result<bool>;

    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>>;
}
