//! Persisted panel settings.
//!
//! Stored as pretty JSON next to the other config files (see [`crate::config`]).
//! Unknown fields are ignored and missing ones take their defaults, so older
//! files keep loading.

use std::path::Path;

use anyhow::{Context, Result};

use crate::widgets::layer_box::ViewMode;

pub const SETTINGS_FILE: &str = "layerbox.json";

/// Layer panel settings
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LayerBoxSettings {
    /// List the global selection mask (read when the panel is created)
    pub show_global_selection: bool,
    /// Quiet period before an opacity slider change is committed
    pub opacity_delay_ms: u64,
    pub view_mode: ViewMode,
}

impl Default for LayerBoxSettings {
    fn default() -> Self {
        Self {
            show_global_selection: false,
            opacity_delay_ms: 200,
            view_mode: ViewMode::Detailed,
        }
    }
}

impl LayerBoxSettings {
    /// Load from `path`. A missing file gives defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        log::info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
