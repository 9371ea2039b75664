//! Configuration file support for loopcheck.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (LOOPCHECK_*)
//! 3. Local config file (./loopcheck.toml)
//! 4. Global config file (~/.config/loopcheck/config.toml)
//!
//! A file that cannot be read or parsed is reported with a warning and
//! skipped, so defaults still apply.

use directories::ProjectDirs;
use log::{debug, warn};
use loopcheck::port::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use loopcheck::sink::DEFAULT_LOG_FILE;
use loopcheck::trial::DEFAULT_SEND_DELAY;
use loopcheck::DEFAULT_PAYLOAD_HEX;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_FILE: &str = "loopcheck.toml";

/// Endpoint used when neither the command line nor a config file names one.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM17";
/// Endpoint used when neither the command line nor a config file names one.
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// `[port]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortSection {
    /// Serial endpoint (e.g., "/dev/ttyUSB0" or "COM17").
    pub name: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// Bound on each read, in milliseconds.
    pub read_timeout_ms: Option<u64>,
}

/// `[trial]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrialSection {
    /// Payload as hex text, whitespace allowed.
    pub payload: Option<String>,
    /// Wait between write and read, in milliseconds.
    pub send_delay_ms: Option<u64>,
    /// Wait between trials, in milliseconds.
    pub loop_delay_ms: Option<u64>,
}

/// `[log]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSection {
    /// Whether the CSV log is written.
    pub enabled: Option<bool>,
    /// CSV log location.
    pub path: Option<PathBuf>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Port configuration.
    #[serde(default)]
    pub port: PortSection,
    /// Trial configuration.
    #[serde(default)]
    pub trial: TrialSection,
    /// CSV log configuration.
    #[serde(default)]
    pub log: LogSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "loopcheck").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; values set in `other` win.
    fn merge(&mut self, other: Self) {
        let Self { port, trial, log } = other;

        if port.name.is_some() {
            self.port.name = port.name;
        }
        if port.baud.is_some() {
            self.port.baud = port.baud;
        }
        if port.read_timeout_ms.is_some() {
            self.port.read_timeout_ms = port.read_timeout_ms;
        }

        if trial.payload.is_some() {
            self.trial.payload = trial.payload;
        }
        if trial.send_delay_ms.is_some() {
            self.trial.send_delay_ms = trial.send_delay_ms;
        }
        if trial.loop_delay_ms.is_some() {
            self.trial.loop_delay_ms = trial.loop_delay_ms;
        }

        if log.enabled.is_some() {
            self.log.enabled = log.enabled;
        }
        if log.path.is_some() {
            self.log.path = log.path;
        }
    }

    /// Serial endpoint, falling back to the platform default.
    pub fn port_name(&self) -> &str {
        self.port
            .name
            .as_deref()
            .unwrap_or(DEFAULT_PORT)
    }

    /// Baud rate, falling back to 115200.
    pub fn baud_rate(&self) -> u32 {
        self.port
            .baud
            .unwrap_or(DEFAULT_BAUD_RATE)
    }

    /// Read timeout, falling back to one second.
    pub fn read_timeout(&self) -> Duration {
        self.port
            .read_timeout_ms
            .map_or(DEFAULT_READ_TIMEOUT, Duration::from_millis)
    }

    /// Payload hex text, falling back to the built-in payload.
    pub fn payload_hex(&self) -> &str {
        self.trial
            .payload
            .as_deref()
            .unwrap_or(DEFAULT_PAYLOAD_HEX)
    }

    /// Wait between write and read.
    pub fn send_delay(&self) -> Duration {
        self.trial
            .send_delay_ms
            .map_or(DEFAULT_SEND_DELAY, Duration::from_millis)
    }

    /// Wait between trials.
    pub fn loop_delay(&self) -> Duration {
        self.trial
            .loop_delay_ms
            .map_or(Duration::ZERO, Duration::from_millis)
    }

    /// Whether the CSV log is written; on unless disabled.
    pub fn log_enabled(&self) -> bool {
        self.log
            .enabled
            .unwrap_or(true)
    }

    /// CSV log location, `serial_log.csv` in the working directory by default.
    pub fn log_path(&self) -> PathBuf {
        self.log
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}
