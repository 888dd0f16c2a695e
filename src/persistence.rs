//! Persistence of applied configurations
//!
//! After a topology is installed, the configuration that produced it is handed
//! to a [`ConfigStore`] so the controller can come back up with the same
//! topology after a restart. The store sees the source text, its format, and a
//! snapshot of what was actually built.

use crate::document::DocumentFormat;
use crate::error::{ControllerError, Result, ResultExt};
use crate::topology::TopologySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A configuration as it was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// Configuration text exactly as received
    pub source: String,
    pub format: DocumentFormat,
    pub saved_at: DateTime<Utc>,
    /// What the builder produced from `source`
    pub topology: TopologySnapshot,
}

impl PersistedConfig {
    pub fn new(
        source: impl Into<String>,
        format: DocumentFormat,
        topology: TopologySnapshot,
    ) -> Self {
        Self {
            source: source.into(),
            format,
            saved_at: Utc::now(),
            topology,
        }
    }
}

/// Storage for the most recently applied configuration
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore: Send {
    /// Replace the stored configuration
    fn save(&self, config: &PersistedConfig) -> Result<()>;

    /// The stored configuration, if one was ever saved
    fn load(&self) -> Result<Option<PersistedConfig>>;
}

/// Stores the configuration as pretty JSON in a single file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured path, or in the platform data directory
    pub fn from_config(config: &crate::config::PersistenceConfig) -> Result<Self> {
        Ok(Self::new(config.resolved_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for FileConfigStore {
    fn save(&self, config: &PersistedConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(ControllerError::from)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(config)?;

        // Write beside the target and rename so a crash never leaves half a file
        let temp = self.temp_path();
        std::fs::write(&temp, json)
            .map_err(ControllerError::from)
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        std::fs::rename(&temp, &self.path)
            .map_err(ControllerError::from)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        tracing::debug!("Persisted configuration to {:?}", self.path);
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)
            .map_err(ControllerError::from)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let config = serde_json::from_str(&json).map_err(|e| {
            ControllerError::Persistence(format!(
                "Stored configuration at {} is corrupt: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(config))
    }
}

/// Keeps the configuration in memory; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    slot: Arc<Mutex<Option<PersistedConfig>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored configuration without going through the trait
    pub fn stored(&self) -> Option<PersistedConfig> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn save(&self, config: &PersistedConfig) -> Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(config.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedConfig>> {
        Ok(self.stored())
    }
}
