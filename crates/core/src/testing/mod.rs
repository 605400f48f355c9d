//! Testing utilities and mock implementations.
//!
//! Mocks for the two external seams of the pipeline: the broker subscription
//! and subprocess execution. Lets the full intake-to-deployment path run
//! without RabbitMQ, git or docker.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagdeploy_core::testing::{fixtures, MockCommandRunner, MockMessageSource};
//!
//! let (source, broker) = MockMessageSource::new();
//! let runner = MockCommandRunner::new();
//!
//! broker.publish_notification(&fixtures::tag_push("svc", "v1.0.0"));
//! ```

mod mock_runner;
mod mock_source;

pub use mock_runner::MockCommandRunner;
pub use mock_source::{MockBroker, MockMessageSource};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{DeployConfig, PathsConfig};
    use crate::notification::{Notification, Owner, Pusher, Repository};

    /// A tag push for `repo` at `tag`, every field populated.
    pub fn tag_push(repo: &str, tag: &str) -> Notification {
        push(repo, &format!("refs/tags/{}", tag))
    }

    /// A branch push for `repo`; never deployed.
    pub fn branch_push(repo: &str, branch: &str) -> Notification {
        push(repo, &format!("refs/heads/{}", branch))
    }

    fn push(repo: &str, git_ref: &str) -> Notification {
        Notification {
            git_ref: git_ref.to_string(),
            repository: Repository {
                name: repo.to_string(),
                owner: Owner {
                    name: "ops".to_string(),
                    email: "ops@example.com".to_string(),
                },
                url: format!("https://example/{}.git", repo),
                git_url: format!("git://example/{}.git", repo),
            },
            pusher: Pusher {
                name: "releaser".to_string(),
                email: "releaser@example.com".to_string(),
            },
            base_ref: "refs/heads/main".to_string(),
        }
    }

    /// JSON payload as the broker would deliver it.
    pub fn payload(notification: &Notification) -> Vec<u8> {
        serde_json::to_vec(notification).unwrap_or_default()
    }

    /// Filesystem roots under `base`: `projects`, `logs`, `configs`.
    pub fn paths_under(base: &Path) -> PathsConfig {
        PathsConfig {
            projects: base.join("projects"),
            commands_logs: base.join("logs"),
            configs: base.join("configs"),
        }
    }

    /// Launch with `docker compose up -d`.
    pub fn deploy_config() -> DeployConfig {
        DeployConfig::default()
    }
}
