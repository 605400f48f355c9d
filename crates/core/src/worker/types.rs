use serde::Serialize;

/// Snapshot of the worker pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    /// Whether the pool is accepting work.
    pub running: bool,
    /// Number of spawned workers.
    pub workers: usize,
    /// Deployments currently executing.
    pub active: usize,
    /// Tasks taken off the queue since startup.
    pub processed: u64,
    pub deployed: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Result of stopping the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The queue drained and every worker exited.
    Drained,
    /// The deadline passed; workers were abandoned mid-task.
    TimedOut { still_running: usize },
}
