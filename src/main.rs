//! pointwell service binary.
//!
//! Wires the collection pipeline to a scheduler and serves the query
//! endpoint until a shutdown signal arrives.

use clap::Parser;
use pointwell::{
    client::{ClientConfig, ProducerClient},
    collector::Scheduler,
    config::Config,
    pipeline::Pipeline,
    server,
    store::{DataPointStore, InfluxConfig, InfluxStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pointwell")]
#[command(about = "Periodic data-point collector and query service", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&cli.config)?;
    tracing::info!(
        storage_host = %config.storage.host,
        database = %config.storage.database,
        producer_host = %config.producer.host,
        addr = %config.http.addr,
        poll_interval_ms = config.collector.poll_interval_ms,
        "configuration loaded"
    );

    let store: Arc<dyn DataPointStore> = Arc::new(InfluxStore::new(InfluxConfig {
        host: config.storage.host.clone(),
        token: config.storage.token.clone(),
        database: config.storage.database.clone(),
    })?);

    let client = ProducerClient::new(ClientConfig::new(config.producer.host.clone()))?;
    let pipeline = Arc::new(Pipeline::new(client, Arc::clone(&store)));

    let scheduler = Scheduler::new(
        "data-collector",
        Duration::from_millis(config.collector.poll_interval_ms),
        move |cancel| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.tick(cancel).await.map_err(Into::into) }
        },
    );
    scheduler.start();

    let app = server::router(store);
    let listener = tokio::net::TcpListener::bind(&config.http.addr).await?;
    tracing::info!(addr = %config.http.addr, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("stopping data collector");
    scheduler.stop().await;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
