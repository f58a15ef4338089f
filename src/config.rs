//! Config and data file locations.
//!
//! Priority for both directories:
//! 1. `--config-dir` CLI argument
//! 2. `LAYERBOX_CONFIG_DIR` environment variable
//! 3. Current directory, if it already holds one of our files
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/layerbox (config), ~/.local/share/layerbox (data)
//! - macOS: ~/Library/Application Support/layerbox
//! - Windows: %APPDATA%\layerbox

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "layerbox";
pub const CONFIG_DIR_ENV: &str = "LAYERBOX_CONFIG_DIR";
pub const LOG_FILE: &str = "layerbox.log";

/// Files whose presence makes the current directory the config directory
const LOCAL_MARKERS: [&str; 2] = [crate::prefs::SETTINGS_FILE, LOG_FILE];

/// Overrides for the default locations
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI argument first, then `LAYERBOX_CONFIG_DIR`
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir).join(name)
}

/// Path to a data file (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir).join(name)
}

/// Create the config and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, dirs_next::config_dir);
    let data_dir = resolve_dir(config, dirs_next::data_dir);
    for dir in [&config_dir, &data_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    LOCAL_MARKERS.iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform: fn() -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Ok(cwd) = std::env::current_dir()
        && has_local_files(&cwd)
    {
        return cwd;
    }
    platform()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}
