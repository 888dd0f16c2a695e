//! Lifecycle manager for workers and shared primitives
//!
//! A reconfiguration cycle that recreates resources moves through
//!
//! ```text
//! RUNNING -> DRAINING -> STOPPED -> BUILDING -> RESUMING -> RUNNING
//! ```
//!
//! and one that only swaps the topology goes `RUNNING -> BUILDING -> RUNNING`.
//!
//! - **DRAINING**: every motor is commanded to STOP, then the settling
//!   interval elapses so in-flight actuation can finish.
//! - **STOPPED**: the gate is flagged, both workers are cancelled and given a
//!   grace period, then both primitives are destroyed. A worker that outlives
//!   its grace period is detached: it keeps the previous topology and
//!   primitives generation, and the cycle continues on fresh ones.
//! - **BUILDING**: the new topology is installed. No worker exists on the
//!   teardown path.
//! - **RESUMING**: primitives are created first, then both workers.
//!
//! If RESUMING fails the controller is left [`LifecyclePhase::Degraded`]: no
//! workers, no primitives, until a later cycle succeeds.

pub mod cancel;
pub mod gate;
pub mod worker;

pub use cancel::CancelToken;
pub use gate::{Blob, DestroyOutcome, GateClosed, ResourceGate};
pub use worker::{
    Worker, WorkerContext, WorkerExit, WorkerHandle, WorkerHandles, WorkerSet, HW_MANAGEMENT,
    PROCESS_LOGIC,
};

use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::topology::{Hand, SharedTopology};

/// Where the controller is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    /// No topology has been applied and no worker has run
    #[default]
    Uninitialized,
    /// Workers are running against the current topology
    Running,
    /// Actuators are being brought to a safe state
    Draining,
    /// No workers and no primitives exist
    Stopped,
    /// A new topology is being installed
    Building,
    /// Primitives and workers are being recreated
    Resuming,
    /// Resuming failed; a successful reconfiguration is needed to recover
    Degraded,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecyclePhase::Uninitialized => "UNINITIALIZED",
            LifecyclePhase::Running => "RUNNING",
            LifecyclePhase::Draining => "DRAINING",
            LifecyclePhase::Stopped => "STOPPED",
            LifecyclePhase::Building => "BUILDING",
            LifecyclePhase::Resuming => "RESUMING",
            LifecyclePhase::Degraded => "DEGRADED",
        };
        f.write_str(name)
    }
}

/// Everything the control plane owns at runtime
#[derive(Debug, Default)]
pub struct ControllerState {
    phase: LifecyclePhase,
    topology: SharedTopology,
    gate: ResourceGate,
    workers: Option<WorkerHandles>,
    root_cancel: CancelToken,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn topology(&self) -> &SharedTopology {
        &self.topology
    }

    pub fn gate(&self) -> &ResourceGate {
        &self.gate
    }

    pub fn workers(&self) -> Option<&WorkerHandles> {
        self.workers.as_ref()
    }

    pub fn has_workers(&self) -> bool {
        self.workers.is_some()
    }

    /// Token every worker token descends from
    pub fn root_cancel(&self) -> &CancelToken {
        &self.root_cancel
    }

    fn set_phase(&mut self, phase: LifecyclePhase) {
        if self.phase != phase {
            tracing::debug!("Lifecycle {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}

/// What a teardown did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeardownReport {
    /// Motors that were running when STOP was commanded
    pub motors_stopped: usize,
    /// How each worker ended, if workers existed
    pub worker_exits: Option<[WorkerExit; 2]>,
    /// What happened to the primitives
    pub primitives: DestroyOutcome,
}

/// Sequences teardown and recreation of workers and primitives
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    config: LifecycleConfig,
    workers: WorkerSet,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig, workers: WorkerSet) -> Self {
        Self { config, workers }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Replace the timings used from the next phase on
    pub fn set_config(&mut self, config: LifecycleConfig) {
        self.config = config;
    }

    /// DRAINING: stop every motor, then let in-flight actuation settle
    pub fn drain(&self, state: &mut ControllerState) -> usize {
        state.set_phase(LifecyclePhase::Draining);
        let stopped = state.topology.stop_all_motors();
        tracing::info!("Commanded STOP on all motors ({} were running)", stopped);

        if state.has_workers() {
            std::thread::sleep(self.config.settling_interval());
        }
        stopped
    }

    /// STOPPED: close the gate, stop both workers, destroy both primitives
    pub fn stop(
        &self,
        state: &mut ControllerState,
    ) -> (Option<[WorkerExit; 2]>, DestroyOutcome) {
        state.gate.begin_teardown();
        let exits = self.stop_workers(state);
        let primitives = state.gate.destroy(self.config.worker_grace_period());
        state.set_phase(LifecyclePhase::Stopped);
        (exits, primitives)
    }

    /// DRAINING followed by STOPPED
    pub fn teardown(&self, state: &mut ControllerState) -> TeardownReport {
        let motors_stopped = self.drain(state);
        let (worker_exits, primitives) = self.stop(state);
        TeardownReport {
            motors_stopped,
            worker_exits,
            primitives,
        }
    }

    fn stop_workers(&self, state: &mut ControllerState) -> Option<[WorkerExit; 2]> {
        let exits = state
            .workers
            .take()
            .map(|workers| workers.stop(self.config.worker_grace_period()))?;
        tracing::info!("Workers stopped: {:?}", exits);

        if exits.contains(&WorkerExit::Detached) {
            // The detached worker keeps its clone; later installs go elsewhere
            state.topology.renew();
            tracing::error!("Detached worker left on the previous topology and primitives");
        }
        Some(exits)
    }

    /// BUILDING: install a fully built topology, returning its generation
    pub fn install(&self, state: &mut ControllerState, hand: Hand) -> u64 {
        let resume_phase = match state.phase {
            LifecyclePhase::Running => LifecyclePhase::Running,
            LifecyclePhase::Uninitialized => LifecyclePhase::Uninitialized,
            LifecyclePhase::Degraded => LifecyclePhase::Degraded,
            _ => LifecyclePhase::Stopped,
        };

        state.set_phase(LifecyclePhase::Building);
        let generation = state.topology.install(hand);
        tracing::info!("Installed topology generation {}", generation);
        state.topology.debug_dump();

        // Without a resume step the controller returns to where it was
        state.set_phase(if state.has_workers() {
            LifecyclePhase::Running
        } else {
            resume_phase
        });
        generation
    }

    /// RESUMING: create primitives, then start both workers
    pub fn resume(&self, state: &mut ControllerState) -> Result<()> {
        state.set_phase(LifecyclePhase::Resuming);

        if state.has_workers() {
            // Only reachable if resume is called without a teardown
            tracing::warn!("Resuming with workers still running, stopping them first");
            state.gate.begin_teardown();
            self.stop_workers(state);
        }

        if state.root_cancel.is_cancelled() {
            tracing::debug!("Controller was shut down, starting a new cancellation root");
            state.root_cancel = CancelToken::new_root();
        }

        let generation = state.gate.create();

        match WorkerHandles::spawn(
            &self.workers,
            &state.topology,
            &state.gate,
            &state.root_cancel,
            self.config.worker_stack_size,
        ) {
            Ok(handles) => {
                state.workers = Some(handles);
                state.set_phase(LifecyclePhase::Running);
                tracing::info!(
                    "Workers started against topology generation {} (primitives generation {})",
                    state.topology.generation(),
                    generation
                );
                Ok(())
            }
            Err(e) => {
                state.gate.destroy(self.config.worker_grace_period());
                state.set_phase(LifecyclePhase::Degraded);
                tracing::error!("Failed to start workers, controller degraded: {}", e);
                Err(e)
            }
        }
    }
}
