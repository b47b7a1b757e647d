use alarm_dispatch::config::AppConfig;
use alarm_dispatch::db::postgres::PgStore;
use alarm_dispatch::db::{self, AlarmRepository};
use alarm_dispatch::{kafka, processor};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Alarm Dispatch Service...");

    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    db::apply_schema(&pool).await?;
    info!("Connected to database");

    let store = Arc::new(PgStore::new(pool));

    let sweep_repo: Arc<dyn AlarmRepository> = store.clone();
    tokio::spawn(processor::sla_sweep::start_sweep_scheduler(
        sweep_repo,
        config.sla.clone(),
        Duration::from_secs(config.sla_sweep_interval_secs.max(1)),
    ));

    kafka::start_kafka_consumer(&config, store).await?;

    Ok(())
}
