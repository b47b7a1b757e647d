use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::models::alarm::AlarmStatus;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: String,
    pub verification: VerificationPolicy,
    pub sla: SlaPolicy,
    pub sla_sweep_interval_secs: u64,
}

/// Field verification limits.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct VerificationPolicy {
    pub geo_tolerance_meters: f64,
    pub max_evidence_files: usize,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            geo_tolerance_meters: 100.0,
            max_evidence_files: 5,
        }
    }
}

/// Per-status time limits in minutes. `None` means the status is not tracked.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SlaPolicy {
    pub unassigned_minutes: Option<i64>,
    pub assigned_minutes: Option<i64>,
    pub in_progress_minutes: Option<i64>,
    pub warning_ratio: f64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            unassigned_minutes: Some(15),
            assigned_minutes: Some(30),
            in_progress_minutes: Some(60),
            warning_ratio: 0.8,
        }
    }
}

impl SlaPolicy {
    pub fn limit_minutes(&self, status: AlarmStatus) -> Option<i64> {
        match status {
            AlarmStatus::Unassigned => self.unassigned_minutes,
            AlarmStatus::Assigned => self.assigned_minutes,
            AlarmStatus::InProgress => self.in_progress_minutes,
            _ => None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Unset keeps the default; zero or negative disables the limit.
fn env_limit(key: &str, default: Option<i64>) -> Option<i64> {
    match env::var(key).ok().and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(minutes) if minutes > 0 => Some(minutes),
        Some(_) => None,
        None => default,
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let kafka_bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_topic = env::var("KAFKA_TOPIC").unwrap_or_else(|_| "alarms-raised".to_string());
        let kafka_group_id =
            env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "alarm-dispatch-consumer".to_string());
        let kafka_auto_offset_reset =
            env::var("KAFKA_AUTO_OFFSET_RESET").unwrap_or_else(|_| "latest".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "SCRAM-SHA-256".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "SASL_PLAINTEXT".to_string());
        let kafka_max_retries = env_or("KAFKA_MAX_RETRIES", 5);
        let kafka_circuit_breaker_cooldown = env_or("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300);

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "alarm_dispatch".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "alarms".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "alarms".to_string());
        let db_max_connections = env_or("DB_MAX_CONNECTIONS", 50);

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let verification_defaults = VerificationPolicy::default();
        let verification = VerificationPolicy {
            geo_tolerance_meters: env_or(
                "GEO_TOLERANCE_METERS",
                verification_defaults.geo_tolerance_meters,
            ),
            max_evidence_files: env_or(
                "MAX_EVIDENCE_FILES",
                verification_defaults.max_evidence_files,
            ),
        };

        let sla_defaults = SlaPolicy::default();
        let sla = SlaPolicy {
            unassigned_minutes: env_limit("SLA_UNASSIGNED_MINUTES", sla_defaults.unassigned_minutes),
            assigned_minutes: env_limit("SLA_ASSIGNED_MINUTES", sla_defaults.assigned_minutes),
            in_progress_minutes: env_limit(
                "SLA_IN_PROGRESS_MINUTES",
                sla_defaults.in_progress_minutes,
            ),
            warning_ratio: env_or("SLA_WARNING_RATIO", sla_defaults.warning_ratio),
        };
        let sla_sweep_interval_secs = env_or("SLA_SWEEP_INTERVAL_SECS", 60);

        Ok(Self {
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            database_url,
            db_max_connections,
            log_level,
            verification,
            sla,
            sla_sweep_interval_secs,
        })
    }
}
