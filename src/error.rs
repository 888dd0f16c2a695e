//! Error handling for the reconfiguration core
//!
//! This module defines the error type for cycles that are aborted before any
//! state is touched, plus the ambient failures (I/O, persistence, thread
//! spawning) of the surrounding control plane. Problems that are recovered
//! locally while building a topology are reported as
//! [`Diagnostic`](crate::topology::Diagnostic) values instead.

use thiserror::Error;

/// Main error type for reconfiguration operations
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The configuration text could not be turned into a structured document
    #[error("Document error: {0}")]
    Document(String),

    /// The document carries a `file_type` tag this controller does not handle
    #[error("Unknown file type: {0}")]
    UnknownFileType(String),

    /// The document has no usable `file_type` tag
    #[error("Document has no file_type tag")]
    MissingFileType,

    /// Errors related to controller configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by a persistence store
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A worker thread could not be started
    #[error("Failed to spawn worker '{name}': {message}")]
    Spawn { name: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ControllerError>,
    },
}

impl ControllerError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ControllerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for errors that abort a cycle before teardown begins
    pub fn is_document_rejection(&self) -> bool {
        match self {
            ControllerError::Document(_)
            | ControllerError::UnknownFileType(_)
            | ControllerError::MissingFileType => true,
            ControllerError::WithContext { source, .. } => source.is_document_rejection(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(err: serde_json::Error) -> Self {
        ControllerError::Serialization(err.to_string())
    }
}

/// Result type alias for reconfiguration operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
