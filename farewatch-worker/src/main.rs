use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use farewatch_core::session_store::{MemorySessionStore, SetupSessionStore};
use farewatch_infra::{
    Config, DbClient, EventProducer, KafkaAlertSink, RedisSessionStore, SidecarLauncher,
};
use farewatch_worker::startup::connect_with_retry;
use farewatch_worker::{AppState, Scheduler, Stores};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "farewatch_worker=debug,farewatch_monitor=debug,farewatch_infra=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!(
        interval_minutes = config.monitor.check_interval_minutes,
        "Starting Farewatch worker"
    );

    // Postgres
    let db = connect_with_retry(
        "Postgres",
        config.database.connect_attempts,
        Duration::from_secs(config.database.connect_retry_secs),
        || DbClient::new(&config.database.url),
    )
    .await
    .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Setup sessions
    let sessions: Arc<dyn SetupSessionStore> = match &config.redis {
        Some(redis) => Arc::new(
            RedisSessionStore::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            warn!("No Redis configured, setup sessions live in process memory");
            Arc::new(MemorySessionStore::new())
        }
    };

    // Kafka
    let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;
    let sink = Arc::new(KafkaAlertSink::new(producer, config.kafka.alert_topic.clone()));

    // Browser sidecar
    let launcher = SidecarLauncher::new(
        &config.extraction.sidecar_url,
        Duration::from_secs(config.extraction.request_timeout_secs),
    )
    .context("Failed to build sidecar client")?;

    let state = AppState::new(
        Stores::postgres(&db),
        Arc::new(launcher),
        sink,
        sessions,
        &config.monitor,
    );

    let scheduler = Scheduler::new(
        state.cycle.clone(),
        Duration::from_secs(config.monitor.check_interval_minutes * 60),
        config.monitor.run_on_startup,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = scheduler.run(shutdown).await;
    state.pool.shutdown().await;

    if let Err(e) = result {
        // Exit non-zero so the supervisor restarts us with a fresh browser
        error!("Worker stopped on infrastructure fault: {}", e);
        std::process::exit(1);
    }

    info!("Worker stopped");
    Ok(())
}
