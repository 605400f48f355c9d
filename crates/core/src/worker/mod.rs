//! Fixed-size pool of deployment workers.
//!
//! Every worker pulls from the same [`TaskReceiver`](crate::queue::TaskReceiver)
//! and runs one deployment at a time. No affinity, no priorities: the first
//! idle worker takes the next task.

mod pool;
mod types;

pub use pool::{WorkerPool, DEFAULT_WORKER_COUNT};
pub use types::{PoolStatus, StopOutcome};
