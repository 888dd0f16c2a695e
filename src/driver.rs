//! Reconfiguration driver
//!
//! [`Controller`] is the entry point for configuration documents. One call to
//! [`Controller::apply`] is one reconfiguration cycle:
//!
//! 1. Parse the text and check its `file_type`. Anything wrong here aborts the
//!    cycle with an error and nothing is touched.
//! 2. Build the new topology from the document.
//! 3. If resources are being recreated, drain and stop (see
//!    [`lifecycle`](crate::lifecycle)).
//! 4. Install the new topology.
//! 5. Persist the configuration. A failure is logged and the cycle goes on.
//! 6. If resources are being recreated, create primitives and start workers.
//!
//! The topology is built before teardown so that actuators stay stopped for as
//! short a time as possible; it is only installed once workers are gone.
//! Cycles are serialized by `&mut self`.

use crate::config::{ControllerConfig, LifecycleConfig};
use crate::document::{ConfigDocument, DocumentFormat};
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::lifecycle::{
    ControllerState, LifecycleManager, LifecyclePhase, ResourceGate, TeardownReport, WorkerSet,
};
use crate::persistence::{ConfigStore, FileConfigStore, PersistedConfig};
use crate::topology::{Diagnostic, SharedTopology, TopologyBuilder};

/// Outcome of a reconfiguration cycle that was not aborted
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Generation of the installed topology
    pub generation: u64,
    /// Recoverable problems found while building
    pub diagnostics: Vec<Diagnostic>,
    /// Inputs in the installed topology
    pub inputs: usize,
    /// Outputs in the installed topology
    pub outputs: usize,
    /// Teardown details if workers and primitives were recreated
    pub teardown: Option<TeardownReport>,
    /// Whether the configuration reached the store
    pub persisted: bool,
}

impl CycleReport {
    pub fn recreated(&self) -> bool {
        self.teardown.is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// The live-reconfiguration control plane
pub struct Controller {
    config: ControllerConfig,
    registry: FunctionRegistry,
    lifecycle: LifecycleManager,
    state: ControllerState,
    store: Box<dyn ConfigStore>,
}

impl Controller {
    /// Create a controller persisting to the given store
    pub fn new(
        config: ControllerConfig,
        workers: WorkerSet,
        store: impl ConfigStore + 'static,
    ) -> Self {
        let lifecycle = LifecycleManager::new(config.lifecycle.clone(), workers);
        Self {
            config,
            registry: FunctionRegistry::builtin().clone(),
            lifecycle,
            state: ControllerState::new(),
            store: Box::new(store),
        }
    }

    /// Create a controller persisting to the file named by its configuration
    pub fn from_config(config: ControllerConfig, workers: WorkerSet) -> Result<Self> {
        let store = FileConfigStore::from_config(&config.persistence)?;
        tracing::info!("Persisting configurations to {:?}", store.path());
        Ok(Self::new(config, workers, store))
    }

    /// Replace the function registry used for future builds
    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Replace the lifecycle timings. Running workers keep going; the new
    /// values apply from the next phase.
    pub fn set_lifecycle(&mut self, lifecycle: LifecycleConfig) {
        self.lifecycle.set_config(lifecycle.clone());
        self.config.lifecycle = lifecycle;
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn topology(&self) -> &SharedTopology {
        self.state.topology()
    }

    pub fn gate(&self) -> &ResourceGate {
        self.state.gate()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.state.phase()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn workers_running(&self) -> bool {
        self.state.has_workers()
    }

    /// Apply a YAML configuration document
    pub fn apply(&mut self, text: &str, recreate_resources: bool) -> Result<CycleReport> {
        self.apply_with_format(text, DocumentFormat::Yaml, recreate_resources)
    }

    /// Apply configuration text in the given format
    pub fn apply_with_format(
        &mut self,
        text: &str,
        format: DocumentFormat,
        recreate_resources: bool,
    ) -> Result<CycleReport> {
        let doc = match ConfigDocument::parse(text, format) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Configuration rejected: {}", e);
                return Err(e);
            }
        };
        self.run_cycle(&doc, text, format, recreate_resources)
    }

    /// Apply an already parsed document. It is persisted as JSON.
    pub fn apply_document(
        &mut self,
        doc: &ConfigDocument,
        recreate_resources: bool,
    ) -> Result<CycleReport> {
        let source = serde_json::to_string_pretty(doc.as_value())?;
        self.run_cycle(doc, &source, DocumentFormat::Json, recreate_resources)
    }

    /// Re-apply the stored configuration, starting workers.
    /// Returns `None` if nothing was ever stored.
    pub fn restore(&mut self) -> Result<Option<CycleReport>> {
        let Some(stored) = self.store.load()? else {
            tracing::info!("No stored configuration to restore");
            return Ok(None);
        };

        tracing::info!(
            "Restoring configuration saved at {}",
            stored.saved_at.to_rfc3339()
        );
        self.apply_with_format(&stored.source, stored.format, true)
            .map(Some)
    }

    /// Bring actuators to a safe state and release workers and primitives
    pub fn shutdown(&mut self) -> TeardownReport {
        let idle = match self.state.phase() {
            LifecyclePhase::Stopped => true,
            // Nothing was ever installed, so no motor can be running
            LifecyclePhase::Uninitialized => self.state.topology().generation() == 0,
            _ => false,
        };
        if idle && !self.state.has_workers() && !self.state.gate().is_live() {
            return TeardownReport::default();
        }

        tracing::info!("Shutting down controller");
        let report = self.lifecycle.teardown(&mut self.state);
        // Reaches detached workers too, whatever token they were handed
        self.state.root_cancel().cancel();
        report
    }

    fn run_cycle(
        &mut self,
        doc: &ConfigDocument,
        source: &str,
        format: DocumentFormat,
        recreate_resources: bool,
    ) -> Result<CycleReport> {
        if let Err(e) = doc.ensure_config_system() {
            tracing::warn!("Configuration rejected: {}", e);
            return Err(e);
        }

        tracing::info!(
            "Reconfiguration started (recreate_resources={})",
            recreate_resources
        );

        let built = TopologyBuilder::new(&self.registry, &self.config.hardware).build(doc);
        let diagnostics = built.diagnostics;
        let inputs = built.topology.inputs().len();
        let outputs = built.topology.outputs().len();

        let teardown = recreate_resources.then(|| self.lifecycle.teardown(&mut self.state));

        let generation = self.lifecycle.install(&mut self.state, built.topology);

        let persisted = self.persist(source, format);

        if recreate_resources {
            self.lifecycle.resume(&mut self.state)?;
        }

        if diagnostics.is_empty() {
            tracing::info!(
                "Reconfiguration complete: {} inputs, {} outputs",
                inputs,
                outputs
            );
        } else {
            tracing::warn!(
                "Reconfiguration complete with {} diagnostics: {} inputs, {} outputs",
                diagnostics.len(),
                inputs,
                outputs
            );
        }

        Ok(CycleReport {
            generation,
            diagnostics,
            inputs,
            outputs,
            teardown,
            persisted,
        })
    }

    fn persist(&self, source: &str, format: DocumentFormat) -> bool {
        let config = PersistedConfig::new(source, format, self.state.topology().snapshot());
        match self.store.save(&config) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to persist configuration: {}", e);
                false
            }
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
