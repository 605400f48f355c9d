//! Mock command runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::deploy::{CommandRunner, DeployError, Invocation};

/// A scripted failure for one program.
#[derive(Debug, Clone)]
struct ScriptedFailure {
    code: i32,
    stderr: String,
}

/// Mock implementation of the CommandRunner trait.
///
/// Provides controllable behavior for testing:
/// - Records every invocation for assertions
/// - `git clone` materializes a checkout with configurable files
/// - Scripted non-zero exits per program, with stderr written to the task log
/// - Simulated run duration and concurrency tracking
///
/// # Example
///
/// ```rust,ignore
/// use tagdeploy_core::testing::MockCommandRunner;
///
/// let runner = MockCommandRunner::new();
/// runner.fail_program("bash", 1, "build.sh: cargo: command not found").await;
///
/// // ... run a deployment ...
///
/// let calls = runner.invocations().await;
/// assert_eq!(calls.last().unwrap().program, "bash");
/// ```
#[derive(Debug, Clone)]
pub struct MockCommandRunner {
    /// Recorded invocations, in call order.
    invocations: Arc<RwLock<Vec<Invocation>>>,
    /// Files written into the destination of `git clone`, relative paths.
    checkout_files: Arc<RwLock<Vec<(PathBuf, String)>>>,
    /// Programs that exit non-zero.
    failures: Arc<RwLock<HashMap<String, ScriptedFailure>>>,
    /// Simulated run duration.
    run_duration: Arc<RwLock<Duration>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl Default for MockCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommandRunner {
    /// Create a runner whose clones contain `build.sh` and two config files.
    pub fn new() -> Self {
        let checkout = vec![
            (PathBuf::from("build.sh"), "#!/bin/bash\necho building\n".to_string()),
            (PathBuf::from("docker-compose.yml"), "services: {}\n".to_string()),
            (PathBuf::from("config/app.conf"), "port=8080\n".to_string()),
            (PathBuf::from("config/db.conf"), "host=db\n".to_string()),
        ];
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            checkout_files: Arc::new(RwLock::new(checkout)),
            failures: Arc::new(RwLock::new(HashMap::new())),
            run_duration: Arc::new(RwLock::new(Duration::ZERO)),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the files a clone produces.
    pub async fn set_checkout_files(&self, files: Vec<(PathBuf, String)>) {
        *self.checkout_files.write().await = files;
    }

    /// Make every run of `program` exit with `code`, writing `stderr` to the log.
    pub async fn fail_program(&self, program: &str, code: i32, stderr: &str) {
        self.failures.write().await.insert(
            program.to_string(),
            ScriptedFailure {
                code,
                stderr: stderr.to_string(),
            },
        );
    }

    /// Set how long each run takes.
    pub async fn set_run_duration(&self, duration: Duration) {
        *self.run_duration.write().await = duration;
    }

    /// All invocations so far.
    pub async fn invocations(&self) -> Vec<Invocation> {
        self.invocations.read().await.clone()
    }

    /// Invocations of one program.
    pub async fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|i| i.program == program)
            .cloned()
            .collect()
    }

    /// Highest number of runs observed at the same time.
    pub fn max_concurrent_runs(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn materialize_clone(&self, invocation: &Invocation) -> std::io::Result<()> {
        let Some(dest) = invocation.args.last() else {
            return Ok(());
        };
        let dest = PathBuf::from(dest);
        tokio::fs::create_dir_all(&dest).await?;
        for (relative, content) in self.checkout_files.read().await.iter() {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, content).await?;
        }
        Ok(())
    }

    async fn execute(&self, invocation: &Invocation, log: &File) -> Result<(), DeployError> {
        let log_err = |e| DeployError::resource("write", "task log", e);
        let mut out = log.try_clone().await.map_err(log_err)?;
        out.write_all(format!("$ {}\n", invocation).as_bytes())
            .await
            .map_err(log_err)?;

        let duration = *self.run_duration.read().await;
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        let failure = self.failures.read().await.get(&invocation.program).cloned();
        if let Some(failure) = failure {
            out.write_all(format!("{}\n", failure.stderr).as_bytes())
                .await
                .map_err(log_err)?;
            out.flush().await.map_err(log_err)?;
            return Err(DeployError::Subprocess {
                program: invocation.program.clone(),
                code: Some(failure.code),
            });
        }

        let is_clone = invocation.args.first().is_some_and(|arg| arg == "clone");
        if invocation.program == "git" && is_clone {
            self.materialize_clone(invocation)
                .await
                .map_err(|e| DeployError::resource("simulate clone into", &invocation.cwd, e))?;
        }

        out.flush().await.map_err(log_err)
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, invocation: &Invocation, log: &File) -> Result<(), DeployError> {
        self.invocations.write().await.push(invocation.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let result = self.execute(invocation, log).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
