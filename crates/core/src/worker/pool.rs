//! Worker pool implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::deploy::{DeployOutcome, DeploymentPipeline};
use crate::queue::TaskReceiver;

use super::types::{PoolStatus, StopOutcome};

/// Default number of workers.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Tracks statistics for the pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicUsize,
    processed: AtomicU64,
    deployed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl PoolStats {
    fn record(&self, outcome: &DeployOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            DeployOutcome::Deployed { .. } => &self.deployed,
            DeployOutcome::Skipped { .. } => &self.skipped,
            DeployOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// N workers draining one work queue into the deployment pipeline.
pub struct WorkerPool {
    pipeline: Arc<DeploymentPipeline>,
    queue: TaskReceiver,
    stats: Arc<PoolStats>,
    running: Arc<AtomicBool>,
    scope: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<DeploymentPipeline>, queue: TaskReceiver) -> Self {
        Self {
            pipeline,
            queue,
            stats: Arc::new(PoolStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            scope: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `count` workers.
    pub async fn start(&self, count: usize) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        let mut workers = self.workers.lock().await;
        for worker_id in 0..count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                self.queue.clone(),
                Arc::clone(&self.pipeline),
                Arc::clone(&self.stats),
            )));
        }

        info!("Worker pool started with {} worker(s)", count);
    }

    /// Close the queue and wait for the workers to drain it.
    ///
    /// Running deployments are allowed to finish. If they are still going when
    /// `deadline` passes, the workers are abandoned; their subprocesses keep
    /// running on their own.
    pub async fn stop(&self, deadline: Duration) -> StopOutcome {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker pool not running");
            return StopOutcome::Drained;
        }

        info!("Stopping worker pool, draining queued tasks");
        self.queue.close();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(deadline, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!("Worker task failed: {}", e);
                    }
                }
                info!("Worker pool stopped");
                StopOutcome::Drained
            }
            Err(_) => {
                let still_running = self.stats.active.load(Ordering::SeqCst);
                warn!(
                    "Forced exit with {} tasks still running after {:?}",
                    still_running, deadline
                );
                self.scope.cancel();
                for abort in aborts {
                    abort.abort();
                }
                StopOutcome::TimedOut { still_running }
            }
        }
    }

    /// Whether the pool is accepting work.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared flag backing [`WorkerPool::is_running`].
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Parent of every task's cancellation scope; cancelled on forced exit.
    pub fn scope(&self) -> CancellationToken {
        self.scope.clone()
    }

    pub async fn status(&self) -> PoolStatus {
        PoolStatus {
            running: self.is_running(),
            workers: self.workers.lock().await.len(),
            active: self.stats.active.load(Ordering::Relaxed),
            processed: self.stats.processed.load(Ordering::Relaxed),
            deployed: self.stats.deployed.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: TaskReceiver,
    pipeline: Arc<DeploymentPipeline>,
    stats: Arc<PoolStats>,
) {
    debug!("Worker {} started", worker_id);

    while let Some(task) = queue.pop().await {
        stats.active.fetch_add(1, Ordering::SeqCst);

        let span = info_span!(
            "deploy",
            worker = worker_id,
            correlation_id = %task.correlation_id,
            repo = %task.notification.repository.name,
        );
        let outcome = pipeline.run(&task).instrument(span).await;
        debug!(
            "Worker {} finished task {}: {:?}",
            worker_id, task.correlation_id, outcome
        );

        stats.record(&outcome);
        stats.active.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("Worker {} exiting, queue closed", worker_id);
}
