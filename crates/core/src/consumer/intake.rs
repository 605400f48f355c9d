//! Broker-to-queue intake loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notification::Notification;
use crate::queue::{Task, TaskSender};

use super::source::MessageSource;

/// Runs a [`MessageSource`] subscription in its own task.
pub struct QueueConsumer {
    shutdown: CancellationToken,
    alive: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueConsumer {
    /// Start consuming.
    ///
    /// Every task gets a child of `scope` as its cancellation scope. The
    /// consumer owns `sender`; once it stops, the work queue sees no more
    /// producers.
    pub fn spawn<S>(source: S, sender: TaskSender, scope: CancellationToken) -> Self
    where
        S: MessageSource + 'static,
    {
        let shutdown = CancellationToken::new();
        let alive = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn(intake_loop(
            source,
            sender,
            scope,
            shutdown.clone(),
            Arc::clone(&alive),
        ));

        Self {
            shutdown,
            alive,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Whether the subscription is still running.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Shared flag backing [`QueueConsumer::is_alive`].
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    /// Stop intake and close the subscription. Safe to call more than once.
    pub async fn close(&self) {
        self.shutdown.cancel();

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Queue consumer task failed: {}", e);
            }
        }
    }
}

async fn intake_loop<S: MessageSource>(
    mut source: S,
    sender: TaskSender,
    scope: CancellationToken,
    shutdown: CancellationToken,
    alive: Arc<AtomicBool>,
) {
    info!("Queue consumer listening on {}", source.name());

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = source.next_payload() => next,
        };

        let payload = match next {
            Some(Ok(payload)) => payload,
            Some(Err(e)) => {
                error!("Broker subscription failed: {}", e);
                break;
            }
            None => {
                warn!("Broker subscription ended");
                break;
            }
        };

        let notification = match Notification::decode(&payload) {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Skipping payload of {} bytes: {}", payload.len(), e);
                continue;
            }
        };

        let task = Task::new(notification, scope.child_token());
        let correlation_id = task.correlation_id.clone();
        let summary = format!(
            "{} ({})",
            task.notification.repository.name, task.notification.git_ref
        );
        if sender.available() == 0 {
            debug!("Work queue full, waiting for a worker");
        }

        let pushed = tokio::select! {
            _ = shutdown.cancelled() => {
                warn!("Dropping {} received during shutdown", summary);
                break;
            }
            pushed = sender.push(task) => pushed,
        };
        if pushed.is_err() {
            warn!("Work queue closed, dropping {}", summary);
            break;
        }

        info!(correlation_id = %correlation_id, "Queued {}", summary);
    }

    alive.store(false, Ordering::SeqCst);
    if let Err(e) = source.close().await {
        warn!("{}", e);
    }
    info!("Queue consumer stopped");
}
