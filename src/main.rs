use anyhow::Result;
use cloudmon::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the metrics; logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        project = %app_config.harvest.project,
        fixture = %app_config.source.fixture_path,
        interval_secs = app_config.collector.interval_secs,
        "starting collector"
    );

    let connector = Arc::new(client::FixtureConnector::new(&app_config.source.fixture_path));
    let harvester = Harvester::new(app_config.harvest.clone(), connector);

    let (batch_tx, batch_rx) = mpsc::channel::<MetricBatch>(app_config.collector.channel_capacity);
    let emitter_handle = worker::spawn_emitter(batch_rx, tokio::io::stdout());

    let shutdown = CancellationToken::new();
    let worker_handle = worker::spawn(
        harvester,
        batch_tx,
        worker::WorkerConfig {
            interval_secs: app_config.collector.interval_secs,
            stats_log_interval_secs: app_config.collector.stats_log_interval_secs,
        },
        shutdown.clone(),
    );

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    shutdown.cancel();
    let _ = worker_handle.await;
    // worker dropped its sender; emitter drains and exits
    let _ = emitter_handle.await;

    Ok(())
}
