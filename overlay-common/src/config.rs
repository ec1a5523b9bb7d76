//! Configuration loading and resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Levels 1 and 2 are parsed by the binary (clap with `env`) and arrive here
//! as [`ConfigOverrides`]; this module layers them over the TOML file and the
//! compiled defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name under the platform config dir
const APP_DIR: &str = "stream-overlay";

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub bind_host: String,
    pub port: u16,
    /// Snapshot file written by the persistence gateway
    pub state_file: PathBuf,
    /// Ability/quest catalog JSON
    pub catalog_file: PathBuf,
    /// Directory served as static files
    pub web_root: PathBuf,
    /// Append-only donation ledger (JSON array)
    pub history_file: PathBuf,
    /// Autosave period in seconds; 0 disables autosave
    pub autosave_secs: u64,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            state_file: PathBuf::from("state.json"),
            catalog_file: PathBuf::from("catalog.json"),
            web_root: PathBuf::from("web"),
            history_file: PathBuf::from("web/data/donations.json"),
            autosave_secs: 30,
            log_level: "overlay_server=debug,tower_http=info".to_string(),
        }
    }
}

/// Values supplied on the command line or via environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub state_file: Option<PathBuf>,
    pub catalog_file: Option<PathBuf>,
    pub web_root: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub autosave_secs: Option<u64>,
}

/// On-disk TOML configuration; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub state_file: Option<PathBuf>,
    pub catalog_file: Option<PathBuf>,
    pub web_root: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub autosave_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// Read a TOML config file
///
/// A missing file is not an error (`Ok(None)`); a malformed one is.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config file at {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Platform default config file, if one exists
///
/// `~/.config/stream-overlay/config.toml` on Linux, the equivalent
/// application-support directory elsewhere.
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .filter(|p| p.exists())
}

/// Layer overrides over the TOML file over compiled defaults
pub fn resolve_config(
    overrides: ConfigOverrides,
    config_file: Option<&Path>,
) -> Result<OverlayConfig> {
    let discovered = match config_file {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_file(),
    };

    let file = match &discovered {
        Some(path) => {
            let loaded = load_toml_config(path)?;
            if loaded.is_some() {
                info!("Loaded config file {}", path.display());
            }
            loaded.unwrap_or_default()
        }
        None => TomlConfig::default(),
    };

    let defaults = OverlayConfig::default();
    Ok(OverlayConfig {
        bind_host: overrides
            .bind_host
            .or(file.bind_host)
            .unwrap_or(defaults.bind_host),
        port: overrides.port.or(file.port).unwrap_or(defaults.port),
        state_file: overrides
            .state_file
            .or(file.state_file)
            .unwrap_or(defaults.state_file),
        catalog_file: overrides
            .catalog_file
            .or(file.catalog_file)
            .unwrap_or(defaults.catalog_file),
        web_root: overrides
            .web_root
            .or(file.web_root)
            .unwrap_or(defaults.web_root),
        history_file: overrides
            .history_file
            .or(file.history_file)
            .unwrap_or(defaults.history_file),
        autosave_secs: overrides
            .autosave_secs
            .or(file.autosave_secs)
            .unwrap_or(defaults.autosave_secs),
        log_level: file.log_level.unwrap_or(defaults.log_level),
    })
}
