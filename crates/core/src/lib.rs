//! Tag-push driven deployment processor.
//!
//! Notifications arrive from a message broker, are decoded by the
//! [`QueueConsumer`], and travel through a bounded [`work_queue`] to a
//! [`WorkerPool`] that runs each one through the [`DeploymentPipeline`].

pub mod config;
pub mod consumer;
pub mod deploy;
pub mod health;
pub mod notification;
pub mod queue;
pub mod testing;
pub mod worker;

pub use config::{
    config_paths_from_list, load_config, load_config_from_str, validate_config, AmqpConfig,
    Config, ConfigError, DeployConfig, Environment, HealthConfig, OtlpConfig, PathsConfig,
    WorkersConfig,
};
pub use consumer::{AmqpSource, BrokerError, MessageSource, QueueConsumer};
pub use deploy::{
    CommandRunner, DeployError, DeployOutcome, DeployStep, DeploymentPipeline, Invocation,
    SystemCommandRunner,
};
pub use health::{LivenessMonitor, LivenessReport};
pub use notification::{DecodeError, Notification};
pub use queue::{work_queue, QueueClosed, Task, TaskReceiver, TaskSender};
pub use worker::{PoolStatus, StopOutcome, WorkerPool};
