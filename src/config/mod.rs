//! Configuration module for the reconfiguration core
//!
//! This is the controller's own configuration, not the device configuration
//! documents it applies. It covers:
//! - Lifecycle timings (settling interval, worker grace period)
//! - The hardware profile used to validate pin numbers
//! - Where topology snapshots are persisted
//! - Log filtering and optional file output
//!
//! # App Data Location
//!
//! Unless a path is configured, snapshots are stored in the
//! platform-appropriate data directory under `hand-reconfig`:
//! - **Linux**: `~/.local/share/hand-reconfig/`
//! - **macOS**: `~/Library/Application Support/hand-reconfig/`
//! - **Windows**: `%APPDATA%\hand-reconfig\`
//!
//! # Example
//!
//! ```ignore
//! use hand_reconfig::config::ControllerConfig;
//!
//! let config = ControllerConfig::load_or_default("controller.toml");
//! assert!(config.lifecycle.settling_interval().as_millis() > 0);
//! ```

use crate::error::{ControllerError, Result};
use crate::types::PinNumber;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "hand-reconfig";

/// Snapshot filename inside the data directory
pub const SNAPSHOT_FILE: &str = "topology.json";

/// Default delay between commanding STOP and tearing down workers
pub const DEFAULT_SETTLING_INTERVAL_MS: u64 = 1000;

/// Default time a worker gets to notice cancellation before it is detached
pub const DEFAULT_WORKER_GRACE_PERIOD_MS: u64 = 500;

/// Highest usable GPIO on the default board
pub const DEFAULT_MAX_PIN: PinNumber = 39;

/// Default log filter
pub const DEFAULT_LOG_FILTER: &str = "info,hand_reconfig=debug";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the default snapshot path
pub fn default_snapshot_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(SNAPSHOT_FILE))
}

// ==================== Controller Config ====================

/// Top-level controller configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub hardware: HardwareProfile,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ControllerConfig {
    /// Parse a TOML configuration string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ControllerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load a configuration file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load controller config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ControllerError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| {
            ControllerError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

/// Timings of the teardown/recreate protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay after commanding every motor to STOP, in milliseconds
    #[serde(default = "default_settling_interval_ms")]
    pub settling_interval_ms: u64,

    /// Bounded wait per worker after cancellation, in milliseconds
    #[serde(default = "default_worker_grace_period_ms")]
    pub worker_grace_period_ms: u64,

    /// Worker thread stack size in bytes (platform default if unset)
    #[serde(default)]
    pub worker_stack_size: Option<usize>,
}

fn default_settling_interval_ms() -> u64 {
    DEFAULT_SETTLING_INTERVAL_MS
}

fn default_worker_grace_period_ms() -> u64 {
    DEFAULT_WORKER_GRACE_PERIOD_MS
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settling_interval_ms: DEFAULT_SETTLING_INTERVAL_MS,
            worker_grace_period_ms: DEFAULT_WORKER_GRACE_PERIOD_MS,
            worker_stack_size: None,
        }
    }
}

impl LifecycleConfig {
    pub fn settling_interval(&self) -> Duration {
        Duration::from_millis(self.settling_interval_ms)
    }

    pub fn worker_grace_period(&self) -> Duration {
        Duration::from_millis(self.worker_grace_period_ms)
    }
}

/// Pin constraints of the target board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Highest valid pin number
    #[serde(default = "default_max_pin")]
    pub max_pin: PinNumber,

    /// Pins that exist but must not be assigned (flash, boot straps, ...)
    #[serde(default)]
    pub reserved_pins: Vec<PinNumber>,
}

fn default_max_pin() -> PinNumber {
    DEFAULT_MAX_PIN
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            max_pin: DEFAULT_MAX_PIN,
            reserved_pins: Vec::new(),
        }
    }
}

impl HardwareProfile {
    /// Check whether a raw pin number from a document is usable on this board
    pub fn validate_pin(&self, raw: i64) -> Option<PinNumber> {
        let pin = PinNumber::try_from(raw).ok()?;
        if pin > self.max_pin || self.reserved_pins.contains(&pin) {
            return None;
        }
        Some(pin)
    }
}

/// Where applied configurations are persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Snapshot file path (defaults to the app data directory)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl PersistenceConfig {
    /// Configured path, falling back to the platform data directory
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => default_snapshot_path().ok_or_else(|| {
                ControllerError::Config("Could not determine app data directory".to_string())
            }),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Directory for daily rolling log files (stdout only if unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}
