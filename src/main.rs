// Main entry point - Dependency injection, poll loop and scrape server
use std::fmt::Debug;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use clap::Parser;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use sensor_exporter::application::display::DisplayPanel;
use sensor_exporter::application::publisher::Publisher;
use sensor_exporter::application::sampler::Sampler;
use sensor_exporter::application::scheduler::Scheduler;
use sensor_exporter::application::sensor_adapter::SensorAdapter;
use sensor_exporter::cli::Args;
use sensor_exporter::domain::reading::{Averaged, MetricSource};
use sensor_exporter::infrastructure::config::{load_settings, DisplayKind, ExporterConfig, SensorKind};
use sensor_exporter::infrastructure::console_panel::ConsolePanel;
use sensor_exporter::infrastructure::metric_set::MetricSet;
use sensor_exporter::infrastructure::pzem::Pzem016;
use sensor_exporter::infrastructure::sds011::Sds011;
use sensor_exporter::infrastructure::serial_link::open_port;
use sensor_exporter::presentation::app_state::AppState;
use sensor_exporter::presentation::handlers::{health_check, scrape_metrics};

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    // Load configuration: file <- environment <- command line
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);
    let config = ExporterConfig::resolve(settings)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        let _ = stop_tx.send(true);
    });

    // The port is opened once and owned by the adapter for the life of the process
    let port = open_port(&config.device, config.read_timeout)?;
    tracing::info!(sensor = ?config.sensor, device = %config.device, "serial device opened");

    match config.sensor {
        SensorKind::Pzem016 => serve(Pzem016::new(port, config.modbus_address), &config, stop_rx).await,
        SensorKind::Sds011 => serve(Sds011::new(port), &config, stop_rx).await,
    }
}

async fn serve<A>(adapter: A, config: &ExporterConfig, stop: watch::Receiver<bool>) -> anyhow::Result<()>
where
    A: SensorAdapter,
    A::Reading: MetricSource + Averaged + Debug,
{
    let metrics = Arc::new(MetricSet::new(A::Reading::gauges()));
    let state = Arc::new(AppState {
        metrics: metrics.clone(),
    });

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/metrics", get(scrape_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?;
    tracing::info!(%addr, "metrics server listening");

    let http_stop = stop.clone();
    let http = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(stopped(http_stop))
            .await
    });

    let scheduler = Scheduler::new(
        Sampler::new(adapter, config.policy),
        Publisher::new(metrics),
        display(config.display),
        config.timing.cycle_delay,
    );
    scheduler.run(stopped(stop)).await?;

    http.await
        .context("metrics server task failed")?
        .context("metrics server failed")?;
    Ok(())
}

fn display(kind: DisplayKind) -> Option<Box<dyn DisplayPanel>> {
    match kind {
        DisplayKind::None => None,
        DisplayKind::Console => Some(Box::new(ConsolePanel::new(std::io::stdout()))),
    }
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(err) => tracing::warn!(error = %err, "SIGTERM handler unavailable"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}
