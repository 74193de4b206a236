//! Configuration management for keybridge
//!
//! Handles loading and saving settings: where remote sessions connect, which
//! gadget device receives the key reports, and the report timing.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::serializer::{DEFAULT_DWELL, DEFAULT_SETTLE};

/// keybridge configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Address the remote-session listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// USB gadget HID device that receives keyboard reports
    #[serde(default = "default_hid_device")]
    pub hid_device: PathBuf,

    /// How long a press is held before release, in milliseconds
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// Gap after release before the next report, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Whether to attach the local raw-mode console on startup
    #[serde(default = "default_console")]
    pub console: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:7322".to_string()
}

fn default_hid_device() -> PathBuf {
    PathBuf::from("/dev/hidg0")
}

fn default_dwell_ms() -> u64 {
    DEFAULT_DWELL.as_millis() as u64
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE.as_millis() as u64
}

fn default_console() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            hid_device: default_hid_device(),
            dwell_ms: default_dwell_ms(),
            settle_ms: default_settle_ms(),
            console: default_console(),
        }
    }
}

impl Config {
    /// Get config directory path (~/.keybridge)
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".keybridge")
    }

    /// Get config file path (~/.keybridge/config.toml)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path())
    }

    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // Atomic write: write to temp file then rename
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to rename config file to {}", path.display()))?;

        Ok(())
    }
}
