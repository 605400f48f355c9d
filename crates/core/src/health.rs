//! Binary liveness derived from the consumer and the worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::consumer::QueueConsumer;
use crate::worker::WorkerPool;

/// Detail behind a liveness answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
    pub alive: bool,
    pub consumer_alive: bool,
    pub workers_running: bool,
}

/// Answers "is this process still doing its job?".
///
/// Alive while the broker subscription runs and the worker pool accepts work.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    consumer_alive: Arc<AtomicBool>,
    workers_running: Arc<AtomicBool>,
}

impl LivenessMonitor {
    pub fn new(consumer: &QueueConsumer, pool: &WorkerPool) -> Self {
        Self::from_flags(consumer.alive_flag(), pool.running_flag())
    }

    pub fn from_flags(consumer_alive: Arc<AtomicBool>, workers_running: Arc<AtomicBool>) -> Self {
        Self {
            consumer_alive,
            workers_running,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.report().alive
    }

    pub fn report(&self) -> LivenessReport {
        let consumer_alive = self.consumer_alive.load(Ordering::SeqCst);
        let workers_running = self.workers_running.load(Ordering::SeqCst);
        LivenessReport {
            alive: consumer_alive && workers_running,
            consumer_alive,
            workers_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alive_requires_both() {
        let consumer = Arc::new(AtomicBool::new(true));
        let workers = Arc::new(AtomicBool::new(true));
        let monitor = LivenessMonitor::from_flags(Arc::clone(&consumer), Arc::clone(&workers));
        assert!(monitor.is_alive());

        consumer.store(false, Ordering::SeqCst);
        let report = monitor.report();
        assert!(!report.alive);
        assert!(!report.consumer_alive);
        assert!(report.workers_running);

        consumer.store(true, Ordering::SeqCst);
        workers.store(false, Ordering::SeqCst);
        assert!(!monitor.is_alive());
    }
}
