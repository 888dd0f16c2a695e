//! # hand-reconfig: live reconfiguration for an embedded controller
//!
//! A device controller keeps a runtime topology (the "hand") of inputs and
//! outputs. Inputs are sensors bound to named transfer functions; outputs are
//! actuators with pin assignments and safety limits. Two background workers
//! run against that topology: hardware management and process logic.
//!
//! This crate turns a declarative configuration document into a new topology
//! and hot-swaps it while those workers are running, without leaving them
//! holding references to objects or primitives that no longer exist.
//!
//! ## Architecture
//!
//! - **functions**: Static registry of named transfer functions
//! - **document**: YAML/JSON configuration documents
//! - **topology**: The runtime topology and the builder producing it
//! - **lifecycle**: Workers, shared primitives, and the teardown/resume protocol
//! - **persistence**: Storage of the last applied configuration
//! - **driver**: The [`Controller`] running reconfiguration cycles
//!
//! ## Example
//!
//! ```ignore
//! use hand_reconfig::{config::ControllerConfig, lifecycle::WorkerSet, Controller};
//!
//! let config = ControllerConfig::load_or_default("controller.toml");
//! let _guard = hand_reconfig::logging::init(&config.logging)?;
//!
//! let mut controller = Controller::from_config(config, WorkerSet::idle())?;
//! if controller.restore()?.is_none() {
//!     controller.apply("file_type: config_system\ninputs: []\noutputs: []\n", true)?;
//! }
//! ```

pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod functions;
pub mod lifecycle;
pub mod logging;
pub mod persistence;
pub mod topology;
pub mod types;

pub use document::{ConfigDocument, DocumentFormat};
pub use driver::{Controller, CycleReport};
pub use error::{ControllerError, Result};
pub use functions::{FunctionParams, FunctionRegistry, TransferFunction};
pub use lifecycle::{LifecyclePhase, WorkerContext, WorkerSet};
pub use topology::{Diagnostic, Hand, SharedTopology};
