use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "tray-bridge";
const CONFIG_FILE: &str = "tray.toml";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}
