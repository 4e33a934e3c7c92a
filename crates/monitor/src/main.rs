//! Glucose monitor - CGM trend detection and alerting daemon
//!
//! Polls LibreLinkUp on a fixed interval, raises Pushover alarms for
//! sustained low or high glucose, and sends a daily heartbeat.

use anyhow::{Context, Result};
use clap::Parser;
use monitor_lib::{
    alerting::Dispatcher,
    health::{components, HealthRegistry},
    notify::PushoverChannel,
    observability::{MonitorMetrics, StructuredLogger},
    scheduler::{AlertSender, HeartbeatLoop, MonitorLoop, TickPipeline},
    sink::{InfluxSink, SinkWorker, DEFAULT_SINK_BUFFER},
    source::LibreLinkUpSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "glucose-monitor", version, about = "CGM glucose alerting daemon")]
struct Args {
    /// Config file (defaults to config/monitor.{toml,yaml,json} when present)
    #[arg(long, env = "MONITOR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();

    // Load and validate configuration; any error here is fatal
    let config = config::MonitorConfig::load(args.config.as_deref())?;
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }
    let engine = config.engine_config()?;
    let libre = config.libre_credentials()?;
    let pushover = config.pushover_credentials()?;

    let logger = StructuredLogger::new(&libre.username);
    logger.log_startup(
        MONITOR_VERSION,
        engine.tick_interval.as_secs(),
        libre.password.len(),
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = MonitorMetrics::new();

    // Collaborators
    let source = Arc::new(
        LibreLinkUpSource::new(libre, config.libre_options())
            .context("Failed to create LibreLinkUp client")?,
    );
    let channel =
        Arc::new(PushoverChannel::new(pushover).context("Failed to create Pushover client")?);

    let dispatcher = Dispatcher::new(channel, engine.examine_count, engine.tick_interval);
    let sender = AlertSender::new(dispatcher, health_registry.clone(), logger.clone());
    let mut pipeline = TickPipeline::new(&engine, source, sender.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let mut handles = Vec::new();

    // Optional persistence, fed from the pipeline without blocking it
    if let Some(influx) = config.influx_settings() {
        info!(url = %influx.url, bucket = %influx.bucket, "InfluxDB persistence enabled");
        health_registry.register(components::SINK).await;

        let sink = Arc::new(InfluxSink::new(influx).context("Failed to create InfluxDB client")?);
        let (worker, readings_tx) = SinkWorker::new(sink, DEFAULT_SINK_BUFFER);
        let worker = worker.with_health(health_registry.clone());
        handles.push(tokio::spawn(worker.run(shutdown_tx.subscribe())));
        pipeline = pipeline.with_sink(readings_tx);
    }

    // Start health and metrics server before the first tick so probes answer
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_shutdown = shutdown_tx.subscribe();
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state, api_shutdown).await {
            error!(error = %e, "API server failed");
        }
    });

    let latest_rx = pipeline.subscribe_latest();
    let mut monitor = MonitorLoop::new(pipeline, engine.tick_interval);

    // First tick and startup heartbeat; failing to notify is fatal
    if let Err(e) = monitor.start().await {
        logger.log_shutdown("startup heartbeat undeliverable");
        let _ = shutdown_tx.send(());
        return Err(e).context("Startup heartbeat could not be delivered");
    }

    let heartbeat = HeartbeatLoop::new(sender, engine.heartbeat_at, latest_rx);
    handles.push(tokio::spawn(heartbeat.run(shutdown_tx.subscribe())));
    handles.push(tokio::spawn(monitor.run(shutdown_tx.subscribe())));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Task did not shut down cleanly");
        }
    }

    info!("Shutdown complete");
    Ok(())
}
