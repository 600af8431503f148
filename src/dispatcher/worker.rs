//! Worker pool
//!
//! A single polling loop claims work items while a semaphore permit is free,
//! waits on the admission limiter, and spawns one execution per item. The
//! execution's outcome is reported back to the queue, which owns retries.

use crate::config::Config;
use crate::dispatcher::limiter::AdmissionLimiter;
use crate::dispatcher::processor::JobProcessor;
use crate::queue::{FailOutcome, RetentionPolicy, WorkQueue};
use crate::ExportError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often expired queue entries are purged
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Owns the dispatch loop and its lifecycle
pub struct Dispatcher {
    queue: Arc<dyn WorkQueue>,
    processor: Arc<JobProcessor>,
    limiter: AdmissionLimiter,
    concurrency: usize,
    poll_interval: Duration,
    retention: RetentionPolicy,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(config: &Config, queue: Arc<dyn WorkQueue>, processor: Arc<JobProcessor>) -> Self {
        Self {
            queue,
            processor,
            limiter: AdmissionLimiter::from(&config.worker),
            concurrency: config.worker.concurrency.max(1) as usize,
            poll_interval: config.worker.poll_interval(),
            retention: RetentionPolicy::from(&config.queue),
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Recovers stalled items and starts the dispatch loop
    pub async fn start(&mut self) -> Result<(), ExportError> {
        if self.handle.is_some() {
            return Ok(());
        }

        let recovered = self.queue.recover_stalled().await?;
        if recovered > 0 {
            warn!("Returned {} stalled work items to the queue", recovered);
        }

        self.shutdown = CancellationToken::new();
        let worker = DispatchLoop {
            queue: Arc::clone(&self.queue),
            processor: Arc::clone(&self.processor),
            limiter: self.limiter.clone(),
            permits: Arc::new(Semaphore::new(self.concurrency)),
            poll_interval: self.poll_interval,
            retention: self.retention.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.handle = Some(tokio::spawn(worker.run()));

        info!(
            "Dispatcher started: concurrency {}, {} admissions per {:?}",
            self.concurrency,
            self.limiter.max(),
            self.limiter.window()
        );
        Ok(())
    }

    /// Stops admitting work and waits for in-flight executions to finish
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        info!("Dispatcher stopping, draining in-flight jobs");
        self.shutdown.cancel();
        if let Err(e) = handle.await {
            error!("Dispatch loop ended abnormally: {}", e);
        }
        info!("Dispatcher stopped");
    }
}

struct DispatchLoop {
    queue: Arc<dyn WorkQueue>,
    processor: Arc<JobProcessor>,
    limiter: AdmissionLimiter,
    permits: Arc<Semaphore>,
    poll_interval: Duration,
    retention: RetentionPolicy,
    shutdown: CancellationToken,
}

impl DispatchLoop {
    async fn run(self) {
        let mut in_flight = JoinSet::new();
        let mut last_purge: Option<Instant> = None;

        loop {
            while in_flight.try_join_next().is_some() {}

            if last_purge.map_or(true, |at| at.elapsed() >= PURGE_INTERVAL) {
                self.purge_expired().await;
                last_purge = Some(Instant::now());
            }

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = match self.queue.dequeue().await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    drop(permit);
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    error!("Failed to dequeue work item: {}", e);
                    drop(permit);
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    // Claimed but not started; stalled recovery returns it on next start
                    info!(job_id = %delivery.item.job_id, "Shutdown before admission");
                    break;
                }
                _ = self.limiter.admit() => {}
            }

            debug!(
                job_id = %delivery.item.job_id,
                "Admitted attempt {}", delivery.attempt
            );

            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            in_flight.spawn(async move {
                let item = delivery.item;
                let execution = {
                    let processor = Arc::clone(&processor);
                    let item = item.clone();
                    tokio::spawn(async move { processor.process(&item).await })
                };
                let outcome = match execution.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = format!("Job execution panicked: {}", e);
                        error!(job_id = %item.job_id, "{}", message);
                        processor.record_failure(&item.job_id, &message).await;
                        Err(ExportError::Task(message))
                    }
                };
                match outcome {
                    Ok(summary) => {
                        let result = serde_json::to_string(&summary).unwrap_or_default();
                        if let Err(e) = queue.complete(&item.job_id, &result).await {
                            error!(job_id = %item.job_id, "Failed to acknowledge job: {}", e);
                        }
                    }
                    Err(err) => match queue.fail(&item.job_id, &err.to_string()).await {
                        Ok(FailOutcome::Retrying { attempt, delay }) => warn!(
                            job_id = %item.job_id,
                            "Attempt {} failed, retrying in {:?}: {}", attempt, delay, err
                        ),
                        Ok(FailOutcome::Dead { attempts }) => error!(
                            job_id = %item.job_id,
                            "Giving up after {} attempts: {}", attempts, err
                        ),
                        Err(e) => {
                            error!(job_id = %item.job_id, "Failed to record job failure: {}", e)
                        }
                    },
                }
                drop(permit);
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Dispatch task ended abnormally: {}", e);
            }
        }
    }

    /// Sleeps one poll interval; returns true if shutdown was requested
    async fn idle(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.poll_interval) => false,
        }
    }

    async fn purge_expired(&self) {
        match self.queue.purge_expired(&self.retention).await {
            Ok(0) => {}
            Ok(n) => debug!("Purged {} expired queue entries", n),
            Err(e) => warn!("Failed to purge expired queue entries: {}", e),
        }
        match self.processor.purge_stale_uploads().await {
            Ok(0) => {}
            Ok(n) => info!("Discarded {} abandoned upload sessions", n),
            Err(e) => warn!("Failed to purge abandoned upload sessions: {}", e),
        }
    }
}
