use figment::{
    providers::{Env, Format, Toml, Yaml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Prefix for environment variable overrides, e.g. `TAGDEPLOY_AMQP__HOST`
const ENV_PREFIX: &str = "TAGDEPLOY_";

/// File formats a configuration layer may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from the file suffix
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Split a comma-separated list of paths, dropping blank entries
pub fn config_paths_from_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Load configuration from layered files with environment variable overrides.
///
/// Later files override earlier ones; environment variables override all files.
pub fn load_config(paths: &[PathBuf]) -> Result<Config, ConfigError> {
    if paths.is_empty() {
        return Err(ConfigError::NoConfigPaths);
    }

    let mut figment = Figment::new();
    for path in paths {
        let format = ConfigFormat::from_path(path)?;
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = match format {
            ConfigFormat::Toml => figment.merge(Toml::file(path)),
            ConfigFormat::Yaml => figment.merge(Yaml::file(path)),
        };
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    Figment::new()
        .merge(Toml::string(toml_str))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use std::io::Write;
    use tempfile::Builder;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const BASE_YAML: &str = r#"
env: dev
amqp:
  host: rabbit
  port: 5673
  user_name: deployer
  user_pass: secret
  queue: tag-pushes
paths:
  projects: /srv/projects
  commands_logs: /srv/logs
  configs: /srv/configs
"#;

    #[test]
    fn test_split_paths() {
        let paths = config_paths_from_list(" a.yaml, ,b.toml ,");
        assert_eq!(paths, vec![PathBuf::from("a.yaml"), PathBuf::from("b.toml")]);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("x.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("x.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("x.json")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_no_paths() {
        assert!(matches!(load_config(&[]), Err(ConfigError::NoConfigPaths)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(&[PathBuf::from("/nonexistent/config.yaml")]);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_suffix_rejected_before_reading() {
        let file = write_temp(".ini", "whatever");
        let result = load_config(&[file.path().to_path_buf()]);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_single_yaml() {
        let file = write_temp(".yaml", BASE_YAML);
        let config = load_config(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(config.env, Environment::Dev);
        assert_eq!(config.amqp.host, "rabbit");
        assert_eq!(config.amqp.port, 5673);
        assert_eq!(config.amqp.queue, "tag-pushes");
        assert_eq!(config.paths.projects, PathBuf::from("/srv/projects"));
    }

    #[test]
    fn test_later_layer_overrides_earlier() {
        let base = write_temp(".yaml", BASE_YAML);
        let overlay = write_temp(
            ".toml",
            r#"
env = "prod"

[workers]
count = 2

[amqp]
queue = "prod-tags"
"#,
        );

        let config = load_config(&[base.path().to_path_buf(), overlay.path().to_path_buf()])
            .unwrap();
        assert_eq!(config.env, Environment::Prod);
        assert_eq!(config.workers.count, 2);
        assert_eq!(config.amqp.queue, "prod-tags");
        // untouched keys survive from the base layer
        assert_eq!(config.amqp.host, "rabbit");
        assert_eq!(config.workers.queue_capacity, 100);
    }
}
