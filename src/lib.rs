//! Alarm lifecycle core: dispatch of field-investigation alarms by chainage,
//! responder assignment, field verification, operator decisions and SLA
//! escalation over a Postgres store.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod kafka;
pub mod models;
pub mod processor;
pub mod state_machine;
