//! Error types for the deploy module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a single deployment.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A filesystem operation failed.
    #[error("Failed to {action} {}: {source}", .path.display())]
    Resource {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A subprocess could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A subprocess exited unsuccessfully.
    #[error("{program} exited with {}", describe_exit(.code))]
    Subprocess { program: String, code: Option<i32> },
}

impl DeployError {
    /// Creates a filesystem error.
    pub fn resource(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from a subprocess rather than the filesystem.
    pub fn is_subprocess(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::Subprocess { .. })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
