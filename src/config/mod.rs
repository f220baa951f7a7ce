mod file;

pub use file::TrayConfig;

use serde::{Deserialize, Serialize};

/// A context menu entry as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub id: String,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }
}

/// Raw icon bytes plus the decoder tag ("png", "ico", ...). Decoding happens
/// on the loop thread once the toolkit exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconData {
    pub bytes: Vec<u8>,
    pub format: String,
}

impl IconData {
    pub fn new(bytes: impl Into<Vec<u8>>, format: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            format: format.into(),
        }
    }
}

/// Everything the caller configured before the loop started.
#[derive(Debug, Clone, Default)]
pub struct PendingConfiguration {
    pub identity: String,
    pub organization: String,
    pub icon: Option<IconData>,
    pub tray_enabled: bool,
    pub menu_items: Vec<MenuEntry>,
}

impl PendingConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the settings consulted by `run`, without the menu buffer.
    pub fn startup_settings(&self) -> StartupSettings {
        StartupSettings {
            identity: self.identity.clone(),
            organization: self.organization.clone(),
            icon: self.icon.clone(),
            tray_enabled: self.tray_enabled,
        }
    }

    pub fn take_menu_items(&mut self) -> Vec<MenuEntry> {
        std::mem::take(&mut self.menu_items)
    }
}

#[derive(Debug, Clone)]
pub struct StartupSettings {
    pub identity: String,
    pub organization: String,
    pub icon: Option<IconData>,
    pub tray_enabled: bool,
}
