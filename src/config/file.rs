use super::{IconData, MenuEntry};
use crate::bridge::TrayBridge;
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Tray description read by the `tray-bridge` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    pub identity: String,
    pub organization: String,
    pub tray: bool,
    pub icon: Option<PathBuf>,
    pub icon_format: Option<String>,
    pub menu: Vec<MenuEntry>,
    pub poll_interval_ms: u64,
    pub quit_id: String,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            identity: "tray-bridge".to_string(),
            organization: String::new(),
            tray: true,
            icon: None,
            icon_format: None,
            menu: vec![MenuEntry::new("Quit", "quit")],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            quit_id: "quit".to_string(),
        }
    }
}

impl TrayConfig {
    /// Loads the user config, falling back to defaults when none exists.
    pub fn load() -> Result<Self> {
        let path = paths::config_path()?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: TrayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Reads the icon file. The format comes from `icon_format`, else the
    /// file extension; an empty tag lets the decoder sniff the bytes.
    pub fn icon_data(&self) -> Result<Option<IconData>> {
        let Some(path) = &self.icon else {
            return Ok(None);
        };

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read icon {}", path.display()))?;
        let format = self
            .icon_format
            .clone()
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_ascii_lowercase)
            })
            .unwrap_or_default();

        Ok(Some(IconData::new(bytes, format)))
    }

    /// Feeds this description into a bridge that has not started yet.
    pub fn apply_to(&self, bridge: &TrayBridge) -> Result<()> {
        bridge.set_identity(&self.identity);
        bridge.set_organization(&self.organization);

        if let Some(icon) = self.icon_data()? {
            bridge.set_icon(icon.bytes, &icon.format);
        }

        if self.tray {
            bridge.enable_tray();
        }

        for item in &self.menu {
            bridge.add_menu_item(&item.label, &item.id);
        }

        Ok(())
    }
}
