//! The per-task deployment state machine.
//!
//! Filter, reset, acquire, clone, build, configure, launch. Each step runs only
//! if the previous one succeeded; nothing is rolled back or retried. Failures
//! end the task and are reported through [`DeployOutcome`], never propagated.

use std::fmt;
use std::path::{Component, Path};
use std::sync::Arc;

use tokio::fs::File;
use tracing::{error, info, warn};

use crate::config::{DeployConfig, PathsConfig};
use crate::notification::Notification;
use crate::queue::Task;

use super::command::{CommandRunner, Invocation};
use super::error::DeployError;
use super::fs::{copy_config_files, ensure_dir, open_task_log, reset_project_dir};
use super::locks::RepoLocks;
use super::target::DeployTarget;

/// Steps of a deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Filter,
    Reset,
    Acquire,
    Clone,
    Build,
    Configure,
    Launch,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filter => "filter",
            Self::Reset => "reset",
            Self::Acquire => "acquire",
            Self::Clone => "clone",
            Self::Build => "build",
            Self::Configure => "configure",
            Self::Launch => "launch",
        };
        f.write_str(name)
    }
}

/// How a deployment ended.
#[derive(Debug)]
pub enum DeployOutcome {
    /// Every step succeeded.
    Deployed { repo: String, tag: String },
    /// The notification was not a deployable tag push.
    Skipped { reason: String },
    /// A step failed; later steps did not run.
    Failed { step: DeployStep, error: DeployError },
}

impl DeployOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// The step that failed, if any.
    pub fn failed_step(&self) -> Option<DeployStep> {
        match self {
            Self::Failed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

struct StepFailure {
    step: DeployStep,
    error: DeployError,
}

fn at(step: DeployStep) -> impl FnOnce(DeployError) -> StepFailure {
    move |error| StepFailure { step, error }
}

/// Turns tag-push notifications into running deployments.
pub struct DeploymentPipeline {
    paths: PathsConfig,
    compose_command: Vec<String>,
    runner: Arc<dyn CommandRunner>,
    locks: RepoLocks,
}

impl DeploymentPipeline {
    pub fn new(paths: PathsConfig, deploy: DeployConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            paths,
            compose_command: deploy.compose_command,
            runner,
            locks: RepoLocks::new(),
        }
    }

    /// Filesystem roots this pipeline deploys into.
    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Run a task to completion.
    pub async fn run(&self, task: &Task) -> DeployOutcome {
        let notification = &task.notification;

        let tag = match filter(notification) {
            Ok(tag) => tag,
            Err(reason) => {
                info!(
                    "Ignoring notification with ref {:?}: {}",
                    notification.git_ref, reason
                );
                return DeployOutcome::Skipped { reason };
            }
        };
        if notification.tag_is_truncated() {
            warn!(
                "Tag in ref {:?} contains '/', deploying truncated tag {:?}",
                notification.git_ref, tag
            );
        }

        let target = DeployTarget::new(&self.paths, notification, tag, &task.correlation_id);

        let _guard = self.locks.acquire(&target.repo_name).await;

        match self.deploy(&target).await {
            Ok(()) => {
                info!("Deployed {} at {}", target.repo_name, target.tag);
                DeployOutcome::Deployed {
                    repo: target.repo_name,
                    tag: target.tag,
                }
            }
            Err(StepFailure { step, error }) => {
                error!("Deployment failed at {} step: {}", step, error);
                DeployOutcome::Failed { step, error }
            }
        }
    }

    async fn deploy(&self, target: &DeployTarget) -> Result<(), StepFailure> {
        info!("Resetting {}", target.project_path.display());
        if reset_project_dir(&target.project_path)
            .await
            .map_err(at(DeployStep::Reset))?
        {
            info!("Removed previous checkout");
        }
        ensure_dir(&target.projects_root)
            .await
            .map_err(at(DeployStep::Reset))?;

        info!("Opening task log {}", target.log_path.display());
        let log = open_task_log(&target.log_path)
            .await
            .map_err(at(DeployStep::Acquire))?;

        let result = self.run_logged_steps(target, &log).await;

        // subprocess output must be durable before the task returns
        if let Err(e) = log.sync_all().await {
            warn!("Failed to sync task log {}: {}", target.log_path.display(), e);
        }

        result
    }

    async fn run_logged_steps(&self, target: &DeployTarget, log: &File) -> Result<(), StepFailure> {
        let clone = Invocation::new("git", &target.projects_root)
            .args(["clone", "--depth", "1", "--branch"])
            .arg(&target.tag)
            .arg("--")
            .arg(&target.repo_url)
            .arg(&target.project_path);
        self.run_command(DeployStep::Clone, &clone, log).await?;

        let build = Invocation::new("bash", &target.project_path).arg(target.build_script());
        self.run_command(DeployStep::Build, &build, log).await?;

        info!(
            "Copying configs from {} to {}",
            target.config_source().display(),
            target.config_dest.display()
        );
        let copied = copy_config_files(&target.config_source(), &target.config_dest)
            .await
            .map_err(at(DeployStep::Configure))?;
        info!("Installed {} config file(s)", copied);

        let launch = self.launch_invocation(target);
        self.run_command(DeployStep::Launch, &launch, log).await?;

        Ok(())
    }

    fn launch_invocation(&self, target: &DeployTarget) -> Invocation {
        let (program, args) = match self.compose_command.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("docker", &[][..]),
        };
        Invocation::new(program, &target.project_path).args(args)
    }

    async fn run_command(
        &self,
        step: DeployStep,
        invocation: &Invocation,
        log: &File,
    ) -> Result<(), StepFailure> {
        info!("Starting {} step: {}", step, invocation);
        self.runner.run(invocation, log).await.map_err(at(step))
    }
}

/// Accept only tag pushes with a non-empty tag name from a repository whose
/// name is usable as a single directory under the deployment roots.
fn filter(notification: &Notification) -> Result<&str, String> {
    let tag = match notification.tag() {
        None => return Err("not a tag push".to_string()),
        Some("") => return Err("empty tag name".to_string()),
        Some(tag) => tag,
    };

    let repo = &notification.repository.name;
    if !is_single_component(repo) {
        return Err(format!("repository name {:?} is not a plain directory name", repo));
    }

    Ok(tag)
}

/// True for names like `svc`; false for empty, `.`, `..`, nested or absolute names.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('/')
}
