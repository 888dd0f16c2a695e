//! Structured configuration documents
//!
//! Configuration arrives as text (YAML on the device, JSON from tooling) and is
//! turned into a generic [`serde_json::Value`] tree before the topology builder
//! walks it. Keeping the tree untyped at this stage lets the builder reject one
//! bad entry without rejecting the whole document.
//!
//! Expected shape:
//!
//! ```yaml
//! file_type: config_system
//! inputs:
//!   - name: temp1
//!     id: 1
//!     type: analog
//!     function:
//!       name: linear
//!       parameters: { a: 1.0, b: 0.0 }
//! outputs:
//!   - name: motor1
//!     type: DC_motor
//!     safety_threshold: 2.5
//!     pins:
//!       - { type: in1_pin, pin_number: 5 }
//!       - { type: in2_pin, pin_number: 6 }
//!       - { type: sense_pin, pin_number: 34 }
//! ```

use crate::error::{ControllerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only file type that triggers a reconfiguration cycle
pub const CONFIG_SYSTEM_FILE_TYPE: &str = "config_system";

/// Text format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Json,
}

/// A parsed configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Value,
}

impl ConfigDocument {
    /// Parse configuration text in the given format
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self> {
        let root: Value = match format {
            DocumentFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| ControllerError::Document(format!("Invalid YAML: {}", e)))?,
            DocumentFormat::Json => serde_json::from_str(text)
                .map_err(|e| ControllerError::Document(format!("Invalid JSON: {}", e)))?,
        };

        if !root.is_object() {
            return Err(ControllerError::Document(
                "Top level of a configuration document must be a mapping".to_string(),
            ));
        }

        Ok(Self { root })
    }

    /// Wrap an already structured value
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(ControllerError::Document(
                "Top level of a configuration document must be a mapping".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// The `file_type` tag, if present and a string
    pub fn file_type(&self) -> Option<&str> {
        self.root.get("file_type").and_then(Value::as_str)
    }

    /// Check that this document describes a system configuration
    pub fn ensure_config_system(&self) -> Result<()> {
        match self.file_type() {
            Some(CONFIG_SYSTEM_FILE_TYPE) => Ok(()),
            Some(other) => Err(ControllerError::UnknownFileType(other.to_string())),
            None => Err(ControllerError::MissingFileType),
        }
    }

    /// Raw `inputs` section
    pub fn inputs(&self) -> Option<&Value> {
        self.root.get("inputs")
    }

    /// Raw `outputs` section
    pub fn outputs(&self) -> Option<&Value> {
        self.root.get("outputs")
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}
