// Background collection worker.
// Cycles run in the worker; emission runs in a dedicated emitter task (channel).

use crate::accumulator::MetricBatch;
use crate::harvester::Harvester;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;

/// Worker timing config.
pub struct WorkerConfig {
    pub interval_secs: u64,
    /// How often to log harvest stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Spawns the task that writes each batch's metrics as JSON lines to `out`.
/// Batch errors are logged. When the worker drops its sender, this task
/// flushes and exits, handing `out` back.
pub fn spawn_emitter<W>(
    mut batch_rx: mpsc::Receiver<MetricBatch>,
    mut out: W,
) -> tokio::task::JoinHandle<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(batch) = batch_rx.recv().await {
            for error in &batch.errors {
                tracing::warn!(error = %error, operation = "gather", "collection error");
            }
            match write_batch(&mut out, &batch).await {
                Ok(n) => {
                    tracing::debug!(operation = "write_batch", metrics_count = n, "batch written");
                }
                Err(e) => {
                    tracing::warn!(error = %e, operation = "write_batch", "emitter: write failed");
                }
            }
        }
        if let Err(e) = out.flush().await {
            tracing::warn!(error = %e, "emitter: final flush failed");
        }
        tracing::debug!("Emitter shutting down");
        out
    })
}

async fn write_batch<W>(out: &mut W, batch: &MetricBatch) -> anyhow::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    for metric in &batch.metrics {
        serde_json::to_writer(&mut buf, metric)?;
        buf.push(b'\n');
    }
    out.write_all(&buf).await?;
    out.flush().await?;
    Ok(batch.metrics.len())
}

/// Spawns the collection loop. Each cycle runs under a child of `shutdown`,
/// so shutting down also stops the in-flight cycle's fetches.
pub fn spawn(
    mut harvester: Harvester,
    batch_tx: mpsc::Sender<MetricBatch>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let WorkerConfig {
        interval_secs,
        stats_log_interval_secs,
    } = config;
    let stats = harvester.stats();

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let cycle = shutdown.child_token();
                    let mut batch = MetricBatch::new();
                    if let Err(e) = harvester.gather(&mut batch, &cycle).await {
                        if cycle.is_cancelled() {
                            tracing::debug!(error = %e, "collection cycle interrupted");
                        } else {
                            tracing::warn!(error = %e, operation = "gather", "collection cycle failed");
                        }
                    }
                    if !batch.is_empty() && batch_tx.send(batch).await.is_err() {
                        tracing::debug!("Emitter channel closed");
                    }
                }
                _ = stats_log_tick.tick() => {
                    let s = stats.snapshot();
                    tracing::info!(
                        cycles = s.cycles,
                        descriptor_listings = s.descriptor_listings,
                        series_listings = s.series_listings,
                        fetch_errors = s.fetch_errors,
                        metrics_emitted = s.metrics_emitted,
                        "harvest stats"
                    );
                }
            }
        }
    })
}
