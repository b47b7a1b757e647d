//! In-process store used by the test-suite. A transaction holds the store
//! mutex for its whole life, works on a copy and publishes it on commit.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{AlarmRepository, AlarmTx, ChainageDirectory};
use crate::models::alarm::{Alarm, AlarmStatus};
use crate::models::assignment::{select_active, Assignment, AssignmentStatus};
use crate::models::chainage::{Chainage, Role};
use crate::models::log_entry::LogEntry;
use crate::models::verification::Verification;

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub alarms: HashMap<Uuid, Alarm>,
    pub assignments: Vec<Assignment>,
    pub logs: Vec<LogEntry>,
    pub verifications: Vec<Verification>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_log_inserts: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_alarm(&self, alarm: Alarm) {
        self.state.lock().await.alarms.insert(alarm.id, alarm);
    }

    pub async fn put_assignment(&self, assignment: Assignment) {
        self.state.lock().await.assignments.push(assignment);
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Makes every `insert_log` fail, to observe rollback of the whole unit.
    pub fn fail_log_inserts(&self, fail: bool) {
        self.fail_log_inserts.store(fail, Ordering::SeqCst);
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    fail_log_inserts: bool,
}

#[async_trait]
impl AlarmRepository for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn AlarmTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            fail_log_inserts: self.fail_log_inserts.load(Ordering::SeqCst),
        }))
    }

    async fn find_alarm(&self, alarm_id: Uuid) -> Result<Option<Alarm>> {
        Ok(self.state.lock().await.alarms.get(&alarm_id).cloned())
    }

    async fn alarms_with_status(&self, statuses: &[AlarmStatus]) -> Result<Vec<Alarm>> {
        let state = self.state.lock().await;
        let mut alarms: Vec<Alarm> = state
            .alarms
            .values()
            .filter(|a| statuses.contains(&a.status))
            .cloned()
            .collect();
        alarms.sort_by_key(|a| a.created_at);
        Ok(alarms)
    }

    async fn assignments_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<Assignment>> {
        let state = self.state.lock().await;
        let mut assignments: Vec<Assignment> = state
            .assignments
            .iter()
            .filter(|a| a.alarm_id == alarm_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }

    async fn logs_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<LogEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.alarm_id == alarm_id)
            .cloned()
            .collect())
    }

    async fn verifications_for_alarm(&self, alarm_id: Uuid) -> Result<Vec<Verification>> {
        let state = self.state.lock().await;
        Ok(state
            .verifications
            .iter()
            .filter(|v| v.alarm_id == alarm_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlarmTx for MemoryTx {
    async fn lock_alarm(&mut self, alarm_id: Uuid) -> Result<Option<Alarm>> {
        Ok(self.work.alarms.get(&alarm_id).cloned())
    }

    async fn insert_alarm(&mut self, alarm: &Alarm) -> Result<()> {
        if self.work.alarms.contains_key(&alarm.id) {
            bail!("duplicate alarm id {}", alarm.id);
        }
        self.work.alarms.insert(alarm.id, alarm.clone());
        Ok(())
    }

    async fn update_alarm_status(
        &mut self,
        alarm_id: Uuid,
        status: AlarmStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        match self.work.alarms.get_mut(&alarm_id) {
            Some(alarm) => {
                alarm.status = status;
                alarm.updated_at = updated_at;
                Ok(())
            }
            None => bail!("alarm {} vanished", alarm_id),
        }
    }

    async fn find_assignment(&mut self, assignment_id: Uuid) -> Result<Option<Assignment>> {
        Ok(self
            .work
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .cloned())
    }

    async fn active_assignment(&mut self, alarm_id: Uuid) -> Result<Option<Assignment>> {
        Ok(select_active(
            self.work.assignments.iter().filter(|a| a.alarm_id == alarm_id),
        )
        .cloned())
    }

    async fn insert_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        self.work.assignments.push(assignment.clone());
        Ok(())
    }

    async fn update_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        match self
            .work
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment.id)
        {
            Some(stored) => {
                stored.status = assignment.status;
                stored.accepted_at = assignment.accepted_at;
                stored.completed_at = assignment.completed_at;
                Ok(())
            }
            None => bail!("assignment {} vanished", assignment.id),
        }
    }

    async fn supersede_open_assignments(
        &mut self,
        alarm_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let mut superseded = Vec::new();
        for assignment in self
            .work
            .assignments
            .iter_mut()
            .filter(|a| a.alarm_id == alarm_id && a.status.is_open())
        {
            assignment.status = AssignmentStatus::Superseded;
            assignment.completed_at = Some(at);
            superseded.push(assignment.id);
        }
        Ok(superseded)
    }

    async fn insert_verification(&mut self, verification: &Verification) -> Result<()> {
        self.work.verifications.push(verification.clone());
        Ok(())
    }

    async fn insert_log(&mut self, entry: &LogEntry) -> Result<()> {
        if self.fail_log_inserts {
            bail!("log insert failed");
        }
        self.work.logs.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            mut guard, work, ..
        } = *self;
        *guard = work;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    chainages: Vec<Chainage>,
    roles: HashMap<Uuid, Role>,
    mappings: HashSet<(Uuid, Uuid)>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chainage(mut self, chainage: Chainage) -> Self {
        self.chainages.push(chainage);
        self
    }

    pub fn with_user(mut self, user_id: Uuid, role: Role, chainages: &[Uuid]) -> Self {
        self.roles.insert(user_id, role);
        for chainage_id in chainages {
            self.mappings.insert((user_id, *chainage_id));
        }
        self
    }
}

#[async_trait]
impl ChainageDirectory for MemoryDirectory {
    async fn resolve_chainage(&self, value_km: f64) -> Result<Option<Chainage>> {
        Ok(self
            .chainages
            .iter()
            .find(|c| c.contains(value_km))
            .cloned())
    }

    async fn is_mapped(&self, user_id: Uuid, chainage_id: Uuid) -> Result<bool> {
        Ok(self.mappings.contains(&(user_id, chainage_id)))
    }

    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>> {
        Ok(self.roles.get(&user_id).copied())
    }
}
