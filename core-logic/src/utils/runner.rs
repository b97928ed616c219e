use crate::traits::TaskResult;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub success: u64,
    pub failed: u64,
    /// Jobs never started because of Ctrl+C
    pub cancelled: u64,
}

impl BatchStats {
    pub fn total(&self) -> u64 {
        self.success + self.failed + self.cancelled
    }

    pub fn merge(&mut self, other: BatchStats) {
        self.success += other.success;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
    }
}

pub struct WorkerRunner;

impl WorkerRunner {
    /// Runs `job` over `items` with at most `max_workers` in flight.
    ///
    /// After each job its worker sleeps `delay` before taking the next item.
    /// Ctrl+C stops new jobs from starting; running ones are awaited.
    pub async fn run_batch<T, F, Fut>(
        items: Vec<T>,
        max_workers: usize,
        delay: Duration,
        job: F,
    ) -> BatchStats
    where
        T: Send + 'static,
        F: Fn(usize, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskResult>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        let listener = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 Received Ctrl+C. Finishing running jobs...");
                    cloned_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        let stats = Self::run_batch_with_token(items, max_workers, delay, token, job).await;
        listener.abort();
        stats
    }

    pub async fn run_batch_with_token<T, F, Fut>(
        items: Vec<T>,
        max_workers: usize,
        delay: Duration,
        token: CancellationToken,
        job: F,
    ) -> BatchStats
    where
        T: Send + 'static,
        F: Fn(usize, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskResult>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let job = Arc::new(job);
        let mut set = JoinSet::new();
        let mut stats = BatchStats::default();
        let total = items.len();
        let start_time = std::time::Instant::now();

        info!(
            "Starting {} jobs on {} workers (delay {:.1}s)",
            total,
            max_workers.max(1),
            delay.as_secs_f64()
        );

        for (i, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                stats.cancelled = (total - i) as u64;
                warn!("Batch cancelled, {} jobs not started", stats.cancelled);
                break;
            };

            let job = Arc::clone(&job);
            let child_token = token.clone();
            let span = tracing::info_span!("worker", worker_id = format!("{:03}", i + 1));

            set.spawn(
                async move {
                    let outcome = job(i, item).await;
                    tokio::select! {
                        _ = child_token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                    drop(permit);
                    outcome
                }
                .instrument(span),
            );
        }

        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(result)) if result.success => stats.success += 1,
                Ok(Ok(_)) => stats.failed += 1,
                Ok(Err(e)) => {
                    error!("Job failed: {:#}", e);
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("A job panicked or failed to join: {:?}", e);
                    stats.failed += 1;
                }
            }
        }

        let done = stats.success + stats.failed;
        let rate = if done > 0 {
            (stats.success as f64 / done as f64) * 100.0
        } else {
            0.0
        };
        info!(
            "Batch Time: {:.1}s | Success: {} | Fail: {} | Cancelled: {} | Success Rate: {:.2}%",
            start_time.elapsed().as_secs_f64(),
            stats.success,
            stats.failed,
            stats.cancelled,
            rate
        );

        stats
    }
}
