//! Bounded hand-off between the queue consumer and the worker pool.
//!
//! The channel capacity is the only backpressure in the system: when workers
//! fall behind, [`TaskSender::push`] waits, which in turn stalls the broker
//! subscription.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::notification::Notification;

/// Default number of tasks the queue holds before producers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// The queue no longer accepts tasks.
#[derive(Debug, Error)]
#[error("Work queue is closed")]
pub struct QueueClosed(pub Box<Task>);

/// A notification on its way to a worker.
#[derive(Debug)]
pub struct Task {
    pub notification: Notification,
    /// Unique per task; names the per-task log file.
    pub correlation_id: String,
    /// Cooperative cancellation scope for this task.
    pub cancellation: CancellationToken,
}

impl Task {
    /// Wrap a notification with a fresh correlation id.
    pub fn new(notification: Notification, cancellation: CancellationToken) -> Self {
        Self {
            notification,
            correlation_id: Uuid::new_v4().to_string(),
            cancellation,
        }
    }
}

/// Create a bounded work queue.
pub fn work_queue(capacity: usize) -> (TaskSender, TaskReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let closed = CancellationToken::new();
    (
        TaskSender {
            tx,
            closed: closed.clone(),
        },
        TaskReceiver {
            rx: Arc::new(Mutex::new(rx)),
            closed,
        },
    )
}

/// Producer side of the work queue.
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::Sender<Task>,
    closed: CancellationToken,
}

impl TaskSender {
    /// Push a task, waiting while the queue is full.
    ///
    /// Fails if the queue is closed before a slot frees up; the task is
    /// handed back inside the error.
    pub async fn push(&self, task: Task) -> Result<(), QueueClosed> {
        if self.closed.is_cancelled() {
            return Err(QueueClosed(Box::new(task)));
        }

        let permit = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(QueueClosed(Box::new(task))),
            permit = self.tx.reserve() => permit,
        };

        match permit {
            Ok(permit) => {
                permit.send(task);
                Ok(())
            }
            Err(_) => Err(QueueClosed(Box::new(task))),
        }
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Free slots left before [`TaskSender::push`] blocks.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer side of the work queue, shared by every worker.
#[derive(Debug, Clone)]
pub struct TaskReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    closed: CancellationToken,
}

impl TaskReceiver {
    /// Take the next task, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed (or every sender is gone) and
    /// the buffered tasks have been drained.
    pub async fn pop(&self) -> Option<Task> {
        let mut rx = self.rx.lock().await;
        if self.closed.is_cancelled() {
            rx.close();
            return rx.recv().await;
        }

        tokio::select! {
            task = rx.recv() => task,
            _ = self.closed.cancelled() => {
                rx.close();
                rx.recv().await
            }
        }
    }

    /// Stop accepting new tasks. Tasks already queued are still delivered.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`TaskReceiver::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok};

    fn task(name: &str) -> Task {
        let notification = Notification {
            git_ref: format!("refs/tags/{}", name),
            ..Default::default()
        };
        Task::new(notification, CancellationToken::new())
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = task("a");
        let b = task("b");
        assert_ne!(a.correlation_id, b.correlation_id);
        assert!(Uuid::parse_str(&a.correlation_id).is_ok());
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, rx) = work_queue(4);
        for name in ["v1", "v2", "v3"] {
            tx.push(task(name)).await.unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(t) = rx.pop().await {
            seen.push(t.notification.git_ref);
        }
        assert_eq!(seen, vec!["refs/tags/v1", "refs/tags/v2", "refs/tags/v3"]);
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let (tx, rx) = work_queue(2);
        tx.push(task("a")).await.unwrap();
        tx.push(task("b")).await.unwrap();
        assert_eq!(tx.available(), 0);

        let mut blocked = tokio_test::task::spawn(tx.push(task("c")));
        assert_pending!(blocked.poll());

        // a worker frees one slot
        let first = rx.pop().await.unwrap();
        assert_eq!(first.notification.git_ref, "refs/tags/a");

        assert!(blocked.is_woken());
        assert_ready_ok!(blocked.poll());
    }

    #[tokio::test]
    async fn test_close_wins_over_freed_slot() {
        let (tx, rx) = work_queue(1);
        tx.push(task("a")).await.unwrap();

        let mut blocked = tokio_test::task::spawn(tx.push(task("b")));
        assert_pending!(blocked.poll());

        // close and a free slot become ready together
        rx.close();
        assert!(rx.pop().await.is_some());

        let rejected = tokio_test::assert_ready_err!(blocked.poll());
        assert_eq!(rejected.0.notification.git_ref, "refs/tags/b");
        assert!(rx.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_close_drains_then_rejects() {
        let (tx, rx) = work_queue(4);
        tx.push(task("a")).await.unwrap();
        rx.close();

        assert!(tx.is_closed());
        let rejected = tx.push(task("b")).await.unwrap_err();
        assert_eq!(rejected.0.notification.git_ref, "refs/tags/b");

        assert!(rx.pop().await.is_some());
        assert!(rx.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_idle_consumer() {
        let (_tx, rx) = work_queue(1);
        let waiter = {
            let rx = rx.clone();
            tokio::spawn(async move { rx.pop().await })
        };
        tokio::task::yield_now().await;

        rx.close();
        let popped = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("idle consumer should wake on close")
            .unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_dropping_sender_ends_queue() {
        let (tx, rx) = work_queue(1);
        drop(tx);
        assert!(rx.pop().await.is_none());
    }
}
