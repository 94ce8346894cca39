//! Watchdog configuration, read from a TOML file.
//!
//! Every key is optional; an empty file gives the defaults below.
//!
//! ```toml
//! device_name = "Coolpak helium compressor"
//! state_file = "/var/lib/coolpak/last_status_compressor.txt"
//! manufacturer = "Prolific"
//! alert_command = "/usr/local/bin/send_alert_email.sh"
//!
//! [metrics]
//! url = "https://influx.example.org:8086"
//! database = "he"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::transport::DEFAULT_BAUD_RATE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Name passed to the alert command.
    pub device_name: String,
    /// Where the last observed power state is kept between runs.
    pub state_file: PathBuf,
    /// Explicit serial device; discovered by `manufacturer` when unset.
    pub port: Option<String>,
    /// Substring of the USB adapter's manufacturer string.
    pub manufacturer: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub settle_ms: u64,
    /// Treat a silent or garbled device as switched off. When false such runs
    /// are inconclusive: no alert and the record is left alone.
    pub silent_device_is_off: bool,
    /// Program run with the device name and `ON`/`OFF` when the state changes.
    pub alert_command: Option<PathBuf>,
    pub metrics: Option<MetricsConfig>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            device_name: "Coolpak helium compressor".to_string(),
            state_file: PathBuf::from("last_status_compressor.txt"),
            port: None,
            manufacturer: "Prolific".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 2000,
            settle_ms: 100,
            silent_device_is_off: true,
            alert_command: None,
            metrics: None,
        }
    }
}

impl WatchdogConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// InfluxDB line protocol endpoint for the power value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Base URL, `/write` is appended.
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_device_tag")]
    pub device_tag: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "he".to_string()
}

fn default_measurement() -> String {
    "powerstatus".to_string()
}

fn default_device_tag() -> String {
    "compressor".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}
