use rustls::crypto::ring::default_provider;
use spike_data::{SpikeDetector, SpikePipeline, store::CandleStore, streams::reconnect::FeedConnector};
use spike_server::{
    broadcast::{Broadcaster, SessionRegistry},
    config::ServerConfig,
    error::ServerError,
    server::serve,
    worker::run_ingestion,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Optional .env file, real environment variables take precedence
    dotenvy::dotenv().ok();

    init_logging();

    let _ = default_provider().install_default();

    let config = ServerConfig::from_env().inspect_err(|error| {
        error!(%error, "invalid configuration");
    })?;

    info!(
        pairs = ?config.pairs,
        intervals = ?config.intervals,
        upstream = %config.feed.url,
        baseline = ?config.baseline,
        "Starting spike watcher server"
    );

    let registry = Arc::new(SessionRegistry::new(config.pairs.clone()));

    let listener = TcpListener::bind(config.addr).await?;
    info!("Viewers can connect on ws://{}", config.addr);
    tokio::spawn(serve(
        listener,
        Arc::clone(&registry),
        config.viewer_buffer_size,
    ));

    let connector = FeedConnector::new(config.feed.clone(), config.kline_keys())?;
    let (connector_handle, rx) = connector.start();

    let pipeline = SpikePipeline::new(
        CandleStore::default(),
        SpikeDetector::new(config.thresholds),
        config.baseline,
    );
    let ingestion = tokio::spawn(run_ingestion(rx, pipeline, Broadcaster::new(registry)));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("received ctrl-c, shutting down");
        }
        _ = ingestion => {
            error!("ingestion worker exited unexpectedly");
        }
    }

    connector_handle.abort();
    Ok(())
}

/// Initialise logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
