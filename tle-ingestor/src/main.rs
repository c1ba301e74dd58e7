//! Periodically fetch element sets and append the new ones to Postgres.
use std::sync::Arc;

use chrono::Utc;
use envconfig::Envconfig;
use eyre::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use tle_ingestor::{
    config::Config,
    fetch::HttpSource,
    http::{app, listen, setup_metrics_recorder, AppState},
    ingest::{IngestSettings, Ingestor},
    metrics_consts::LAST_CYCLE_TIMESTAMP,
    store::PgStore,
};

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env()?;

    let source = HttpSource::new(&config.source_url, config.request_timeout.0)?;
    let store = PgStore::new(&config.database_url, config.max_pg_connections)?;
    let ingestor = Ingestor::new(source, store, IngestSettings::from(&config));

    let state = Arc::new(AppState::new(config.ingest_interval()));
    let recorder_handle = setup_metrics_recorder()?;
    let router = app(state.clone(), Some(recorder_handle));
    let bind = config.bind();
    tokio::task::spawn(async move {
        if let Err(e) = listen(router, bind).await {
            error!("failed to start tle-ingestor http server, {}", e);
        }
    });

    // Cycles never overlap: the next tick is only awaited once the current cycle is done.
    let mut interval = tokio::time::interval(config.ingest_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let result = ingestor.run_once().await;
        match &result {
            Ok(report) if report.is_complete() => info!("Ingestion cycle complete"),
            Ok(_) => error!("Ingestion cycle finished with failed stages"),
            Err(e) => error!("Ingestion cycle failed: {}", e),
        }

        let now = Utc::now();
        metrics::gauge!(LAST_CYCLE_TIMESTAMP).set(now.timestamp() as f64);
        state.record(&result, now).await;

        if config.run_once {
            info!("RUN_ONCE is set, shutting down");
            return match result {
                Ok(_) => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
    }
}
