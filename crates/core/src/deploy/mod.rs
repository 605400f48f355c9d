//! Deployment of tagged revisions.
//!
//! A [`DeploymentPipeline`] takes one [`Task`](crate::queue::Task) through:
//! - Filter: only `refs/tags/<tag>` refs proceed
//! - Reset: remove the previous checkout of the repository
//! - Acquire: open the per-task log that captures subprocess output
//! - Clone: shallow single-branch clone of the tag
//! - Build: run the repository's `build.sh`
//! - Configure: install the repository's `config/` files
//! - Launch: bring the compose project up detached
//!
//! Deployments of the same repository are serialized by [`RepoLocks`].

mod command;
mod error;
mod fs;
mod locks;
mod pipeline;
mod target;

pub use command::{CommandRunner, Invocation, SystemCommandRunner};
pub use error::DeployError;
pub use fs::{copy_config_files, open_task_log, reset_project_dir};
pub use locks::{RepoGuard, RepoLocks};
pub use pipeline::{DeployOutcome, DeployStep, DeploymentPipeline};
pub use target::DeployTarget;
