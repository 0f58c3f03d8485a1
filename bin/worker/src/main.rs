use relaydesk_worker::config::WorkerConfig;
use relaydesk_worker::error::WorkerError;
use relaydesk_worker::fixtures::Fixtures;
use relaydesk_worker::worker::{Stores, build_dispatcher, run_events};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> relaydesk_core::Result<(), WorkerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::load().map_err(|e| WorkerError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let stores = Stores::new();
    match &config.fixtures_path {
        Some(path) => {
            Fixtures::load(path)?.install(&stores).await?;
        }
        None => tracing::warn!("no fixtures configured, no workflow can match"),
    }

    let dispatcher = build_dispatcher(&config, &stores)?;

    tracing::info!("reading events from stdin");
    let dispatched = run_events(&dispatcher, BufReader::new(tokio::io::stdin())).await?;

    tracing::info!(
        dispatched,
        runs = stores.runs.runs().len(),
        "input closed, shutting down"
    );
    Ok(())
}
