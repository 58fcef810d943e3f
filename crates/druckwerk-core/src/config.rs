// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// System configuration, persisted as JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DruckwerkError, Result};

/// A printer to create at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub name: String,
    pub device_uri: String,
    /// Driver name understood by the binary (e.g. "pwg").
    pub driver: String,
}

/// System-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Directory for spooled document files.
    pub spool_dir: PathBuf,
    /// Poll interval while a printer's device is busy.
    pub busy_poll_interval_ms: u64,
    /// Retry interval while a device cannot be opened.
    pub open_retry_interval_ms: u64,
    /// Keep the device open between jobs instead of closing it.
    pub keep_device_open: bool,
    /// Size of the per-device write buffer.
    pub write_buffer_size: usize,
    /// Completed jobs retained per printer before the oldest are purged.
    pub max_completed_jobs: usize,
    /// Device URI schemes removed from the registry at startup.
    pub disabled_schemes: Vec<String>,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub printers: Vec<PrinterConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            busy_poll_interval_ms: 1000,
            open_retry_interval_ms: 5000,
            keep_device_open: false,
            write_buffer_size: 8192,
            max_completed_jobs: 100,
            disabled_schemes: Vec::new(),
            log_level: "info".into(),
            printers: Vec::new(),
        }
    }
}

impl SystemConfig {
    /// Load a configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.write_buffer_size == 0 {
            return Err(DruckwerkError::Config(
                "write_buffer_size must be positive".into(),
            ));
        }
        if self.busy_poll_interval_ms == 0 || self.open_retry_interval_ms == 0 {
            return Err(DruckwerkError::Config(
                "poll intervals must be positive".into(),
            ));
        }
        for printer in &self.printers {
            if printer.name.trim().is_empty() {
                return Err(DruckwerkError::Config("printer name is empty".into()));
            }
        }
        Ok(())
    }

    pub fn busy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.busy_poll_interval_ms)
    }

    pub fn open_retry_interval(&self) -> Duration {
        Duration::from_millis(self.open_retry_interval_ms)
    }
}

fn default_spool_dir() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("druckwerk").join("spool");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("druckwerk")
            .join("spool");
    }
    PathBuf::from("/tmp/druckwerk-spool")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_uses_defaults() {
        let config: SystemConfig =
            serde_json::from_str(r#"{"keep_device_open": true}"#).expect("parse");
        assert!(config.keep_device_open);
        assert_eq!(config.busy_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.open_retry_interval(), Duration::from_secs(5));
        assert_eq!(config.write_buffer_size, 8192);
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let config = SystemConfig {
            write_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("druckwerk.json");
        let config = SystemConfig {
            disabled_schemes: vec!["file".into()],
            printers: vec![PrinterConfig {
                name: "label".into(),
                device_uri: "socket://192.168.1.20".into(),
                driver: "pwg".into(),
            }],
            ..Default::default()
        };
        config.save(&path).expect("save");

        let loaded = SystemConfig::load(&path).expect("load");
        assert_eq!(loaded.disabled_schemes, vec!["file".to_string()]);
        assert_eq!(loaded.printers, config.printers);
    }
}
