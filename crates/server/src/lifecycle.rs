//! Startup and ordered shutdown of the running service.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use tagdeploy_core::{
    work_queue, BrokerError, CommandRunner, Config, DeploymentPipeline, LivenessMonitor,
    MessageSource, QueueConsumer, StopOutcome, WorkerPool,
};

use crate::health::HealthServer;

/// Every long-running component of the process.
pub struct Service {
    consumer: QueueConsumer,
    pool: WorkerPool,
    health: HealthServer,
    drain_deadline: Duration,
}

impl Service {
    /// Bring the components up in dependency order.
    ///
    /// Workers start before the broker is contacted so nothing delivered can
    /// sit without a consumer. A broker that cannot be reached is fatal.
    pub async fn start<S, F, Fut>(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        connect: F,
    ) -> Result<Self>
    where
        S: MessageSource + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, BrokerError>>,
    {
        let drain_deadline = Duration::from_secs(config.workers.shutdown_timeout_secs);

        let pipeline = Arc::new(DeploymentPipeline::new(
            config.paths.clone(),
            config.deploy.clone(),
            runner,
        ));
        let (sender, receiver) = work_queue(config.workers.queue_capacity);

        let pool = WorkerPool::new(pipeline, receiver);
        pool.start(config.workers.count).await;

        let source = match connect().await {
            Ok(source) => source,
            Err(e) => {
                pool.stop(drain_deadline).await;
                return Err(e).context("Failed to start queue consumer");
            }
        };

        let consumer = QueueConsumer::spawn(source, sender, pool.scope());
        let monitor = LivenessMonitor::new(&consumer, &pool);

        let addr = SocketAddr::new(config.health.host, config.health.port);
        let health = match HealthServer::start(addr, monitor).await {
            Ok(health) => health,
            Err(e) => {
                consumer.close().await;
                pool.stop(drain_deadline).await;
                return Err(e);
            }
        };

        info!("Service started");
        Ok(Self {
            consumer,
            pool,
            health,
            drain_deadline,
        })
    }

    pub fn health_addr(&self) -> SocketAddr {
        self.health.local_addr()
    }

    /// Stop intake, drain the workers, then take the liveness endpoint down.
    pub async fn shutdown(self) -> StopOutcome {
        info!("Closing queue consumer");
        self.consumer.close().await;
        info!("Queue consumer closed");

        info!(
            "Stopping worker pool (deadline {}s)",
            self.drain_deadline.as_secs()
        );
        let outcome = self.pool.stop(self.drain_deadline).await;
        match outcome {
            StopOutcome::Drained => info!("Worker pool stopped"),
            StopOutcome::TimedOut { still_running } => {
                warn!("Worker pool abandoned {} running task(s)", still_running)
            }
        }

        info!("Stopping liveness endpoint");
        self.health.stop().await;
        info!("Liveness endpoint stopped");

        outcome
    }
}
