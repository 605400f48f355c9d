//! Paths and names derived from a task.

use std::path::PathBuf;

use crate::config::PathsConfig;
use crate::notification::Notification;

/// Where a deployment lands on disk.
///
/// One project path per repository name; tags of the same repository share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub repo_name: String,
    pub repo_url: String,
    pub tag: String,
    pub projects_root: PathBuf,
    pub project_path: PathBuf,
    pub log_path: PathBuf,
    pub config_dest: PathBuf,
}

impl DeployTarget {
    pub fn new(
        paths: &PathsConfig,
        notification: &Notification,
        tag: &str,
        correlation_id: &str,
    ) -> Self {
        let repo_name = notification.repository.name.clone();
        Self {
            repo_url: notification.repository.url.clone(),
            tag: tag.to_string(),
            projects_root: paths.projects.clone(),
            project_path: paths.projects.join(&repo_name),
            log_path: paths.commands_logs.join(format!("{}.log", correlation_id)),
            config_dest: paths.configs.join(&repo_name),
            repo_name,
        }
    }

    /// The repository's own build script.
    pub fn build_script(&self) -> PathBuf {
        self.project_path.join("build.sh")
    }

    /// Directory whose files are installed into [`DeployTarget::config_dest`].
    pub fn config_source(&self) -> PathBuf {
        self.project_path.join("config")
    }
}
