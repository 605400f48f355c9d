//! Subprocess execution for the clone, build and launch steps.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::process::Command;

use super::error::DeployError;

/// A program, its arguments, and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs external programs with their output captured to a task log.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Only exit status 0 counts as success.
    async fn run(&self, invocation: &Invocation, log: &File) -> Result<(), DeployError>;
}

/// Runs real processes. Children are not killed when the caller goes away.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }

    async fn log_handle(log: &File) -> Result<std::fs::File, DeployError> {
        let handle = log
            .try_clone()
            .await
            .map_err(|e| DeployError::resource("duplicate handle of", "task log", e))?;
        Ok(handle.into_std().await)
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: &Invocation, log: &File) -> Result<(), DeployError> {
        let stdout = Self::log_handle(log).await?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| DeployError::resource("duplicate handle of", "task log", e))?;

        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .await
            .map_err(|source| DeployError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DeployError::Subprocess {
                program: invocation.program.clone(),
                code: status.code(),
            })
        }
    }
}
