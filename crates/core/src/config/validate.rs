use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Rejects settings the pipeline cannot run with: empty broker settings,
/// missing filesystem roots, a worker pool or queue of size zero, and an
/// empty launch command.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.amqp.host.is_empty() {
        return Err(ConfigError::ValidationError(
            "amqp.host cannot be empty".to_string(),
        ));
    }

    if config.amqp.queue.is_empty() {
        return Err(ConfigError::ValidationError(
            "amqp.queue cannot be empty".to_string(),
        ));
    }

    let roots = [
        ("paths.projects", &config.paths.projects),
        ("paths.commands_logs", &config.paths.commands_logs),
        ("paths.configs", &config.paths.configs),
    ];
    for (name, path) in roots {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    if config.workers.count == 0 {
        return Err(ConfigError::ValidationError(
            "workers.count must be greater than 0".to_string(),
        ));
    }

    if config.workers.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "workers.queue_capacity must be greater than 0".to_string(),
        ));
    }

    if config.health.port == 0 {
        return Err(ConfigError::ValidationError(
            "health.port cannot be 0".to_string(),
        ));
    }

    if config.deploy.compose_command.is_empty() {
        return Err(ConfigError::ValidationError(
            "deploy.compose_command cannot be empty".to_string(),
        ));
    }

    Ok(())
}
