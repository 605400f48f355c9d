use std::path::PathBuf;

use clap::Parser;

use tagdeploy_core::config_paths_from_list;

/// Deploy services from tag-push notifications.
#[derive(Parser, Debug)]
#[command(name = "tagdeploy")]
#[command(version)]
pub struct Cli {
    /// Comma-separated configuration files, later ones override earlier ones.
    #[arg(short, long, env = "CONFIG_PATH", value_name = "FILES")]
    pub config: Option<String>,
}

impl Cli {
    /// Configuration layers in the order they apply.
    pub fn config_paths(&self) -> Vec<PathBuf> {
        self.config
            .as_deref()
            .map(config_paths_from_list)
            .unwrap_or_default()
    }
}
