//! Filesystem steps of a deployment.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::{self, File, OpenOptions};
use tracing::debug;

use super::error::DeployError;

/// Remove a previous checkout if present.
///
/// Returns whether anything was removed. A missing path is not an error.
pub async fn reset_project_dir(project_path: &Path) -> Result<bool, DeployError> {
    match fs::remove_dir_all(project_path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DeployError::resource("remove", project_path, e)),
    }
}

/// Create a directory and its parents if missing.
pub async fn ensure_dir(path: &Path) -> Result<(), DeployError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| DeployError::resource("create directory", path, e))
}

/// Open the per-task log for appending, creating it (and its directory) if absent.
pub async fn open_task_log(log_path: &Path) -> Result<File, DeployError> {
    if let Some(parent) = log_path.parent() {
        ensure_dir(parent).await?;
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(0o600);

    options
        .open(log_path)
        .await
        .map_err(|e| DeployError::resource("open task log", log_path, e))
}

/// Copy the top-level files of `source` into `dest`, creating `dest` if needed.
///
/// Subdirectories are skipped. Permission bits travel with each file.
/// Returns the number of files copied.
pub async fn copy_config_files(source: &Path, dest: &Path) -> Result<usize, DeployError> {
    let mut entries = fs::read_dir(source)
        .await
        .map_err(|e| DeployError::resource("read config directory", source, e))?;

    ensure_dir(dest).await?;

    let mut copied = 0;
    loop {
        let entry = entries
            .next_entry()
            .await
            .map_err(|e| DeployError::resource("read config directory", source, e))?;
        let Some(entry) = entry else {
            break;
        };

        let src_path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| DeployError::resource("inspect", &src_path, e))?;
        if file_type.is_dir() {
            debug!("Skipping config subdirectory {}", src_path.display());
            continue;
        }

        let dst_path = dest.join(entry.file_name());
        fs::copy(&src_path, &dst_path)
            .await
            .map_err(|e| DeployError::resource("copy config file", &src_path, e))?;
        copied += 1;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reset_removes_tree_then_is_noop() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("svc");
        std::fs::create_dir_all(project.join("src")).unwrap();
        std::fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();

        assert!(reset_project_dir(&project).await.unwrap());
        assert!(!project.exists());

        // second reset finds nothing
        assert!(!reset_project_dir(&project).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_task_log_appends() {
        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("logs/abc.log");

        let mut log = open_task_log(&log_path).await.unwrap();
        log.write_all(b"first\n").await.unwrap();
        log.flush().await.unwrap();
        drop(log);

        let mut log = open_task_log(&log_path).await.unwrap();
        log.write_all(b"second\n").await.unwrap();
        log.flush().await.unwrap();
        drop(log);

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_task_log_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let log_path = temp.path().join("x.log");
        open_task_log(&log_path).await.unwrap();

        let mode = std::fs::metadata(&log_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_copy_skips_subdirectories() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("config");
        std::fs::create_dir_all(source.join("nested")).unwrap();
        std::fs::write(source.join("a.conf"), "a=1").unwrap();
        std::fs::write(source.join("b.conf"), "b=2").unwrap();
        std::fs::write(source.join("nested/c.conf"), "c=3").unwrap();

        let dest = temp.path().join("installed/svc");
        let copied = copy_config_files(&source, &dest).await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(std::fs::read_to_string(dest.join("a.conf")).unwrap(), "a=1");
        assert_eq!(std::fs::read_to_string(dest.join("b.conf")).unwrap(), "b=2");
        assert!(!dest.join("nested").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let source = temp.path().join("config");
        std::fs::create_dir_all(&source).unwrap();
        let script = source.join("entrypoint.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o750)).unwrap();

        let dest = temp.path().join("dest");
        copy_config_files(&source, &dest).await.unwrap();

        let mode = std::fs::metadata(dest.join("entrypoint.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[tokio::test]
    async fn test_copy_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = copy_config_files(&temp.path().join("nope"), &temp.path().join("dest")).await;
        assert!(matches!(result, Err(DeployError::Resource { .. })));
        assert!(!temp.path().join("dest").exists());
    }
}
