//! Command-line arguments for the overlay server
//!
//! Flags and their environment variables feed the first two levels of
//! [`overlay_common::config::resolve_config`].

use std::path::PathBuf;

use clap::Parser;
use overlay_common::config::ConfigOverrides;

/// Command-line arguments for overlay-server
#[derive(Parser, Debug, Default)]
#[command(name = "overlay-server")]
#[command(about = "Live-stream overlay server: moderation queues, quests and display broadcast")]
#[command(version)]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "OVERLAY_BIND_HOST")]
    pub bind_host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "OVERLAY_PORT")]
    pub port: Option<u16>,

    /// Snapshot file for saved state
    #[arg(long, env = "OVERLAY_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Ability/quest catalog JSON
    #[arg(long, env = "OVERLAY_CATALOG_FILE")]
    pub catalog_file: Option<PathBuf>,

    /// Directory of static files to serve
    #[arg(long, env = "OVERLAY_WEB_ROOT")]
    pub web_root: Option<PathBuf>,

    /// JSON array that recorded donations are appended to
    #[arg(long, env = "OVERLAY_HISTORY_FILE")]
    pub history_file: Option<PathBuf>,

    /// Autosave period in seconds (0 disables)
    #[arg(long, env = "OVERLAY_AUTOSAVE_SECS")]
    pub autosave_secs: Option<u64>,

    /// TOML config file
    #[arg(short, long, env = "OVERLAY_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_host: self.bind_host.clone(),
            port: self.port,
            state_file: self.state_file.clone(),
            catalog_file: self.catalog_file.clone(),
            web_root: self.web_root.clone(),
            history_file: self.history_file.clone(),
            autosave_secs: self.autosave_secs,
        }
    }
}
