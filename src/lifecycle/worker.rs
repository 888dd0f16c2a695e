//! Background worker threads
//!
//! The controller runs two long-lived workers against the current topology:
//! the hardware management loop and the process/logic loop. Their bodies are
//! supplied by the embedding application through the [`Worker`] trait; this
//! module only owns how they are started and stopped.
//!
//! # Stopping
//!
//! Stopping is cooperative first: the worker's [`CancelToken`] is cancelled
//! and the worker gets a bounded grace period to return. A worker that does
//! not finish in time is detached. Its [`ResourceGate`] is bound to the
//! primitives generation it was started with, so it is refused entry to any
//! primitives created afterwards.
//!
//! Completion is signalled through a crossbeam channel from a drop guard, so a
//! panicking worker is noticed as promptly as one that returns.

use crate::error::{ControllerError, Result};
use crate::lifecycle::cancel::CancelToken;
use crate::lifecycle::gate::ResourceGate;
use crate::topology::SharedTopology;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

/// Thread name of the hardware management worker
pub const HW_MANAGEMENT: &str = "hw_management";

/// Thread name of the process/logic worker
pub const PROCESS_LOGIC: &str = "process_logic";

/// Everything a worker may touch
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Thread name of this worker
    pub name: &'static str,
    /// Topology the worker operates on
    pub topology: SharedTopology,
    /// Gate to the `state` and `payload` blobs of this worker's generation
    pub gate: ResourceGate,
    /// Checked at every safe point; return promptly once cancelled
    pub cancel: CancelToken,
}

/// A worker body
pub trait Worker: Send + Sync + 'static {
    fn run(&self, ctx: WorkerContext);
}

impl<F> Worker for F
where
    F: Fn(WorkerContext) + Send + Sync + 'static,
{
    fn run(&self, ctx: WorkerContext) {
        self(ctx)
    }
}

/// The pair of worker bodies restarted on every reconfiguration
#[derive(Clone)]
pub struct WorkerSet {
    pub hw_management: Arc<dyn Worker>,
    pub process_logic: Arc<dyn Worker>,
}

impl WorkerSet {
    pub fn new(hw_management: impl Worker, process_logic: impl Worker) -> Self {
        Self {
            hw_management: Arc::new(hw_management),
            process_logic: Arc::new(process_logic),
        }
    }

    /// Workers that do nothing but wait for cancellation
    pub fn idle() -> Self {
        fn park(ctx: WorkerContext) {
            while ctx.cancel.sleep_cancellable(Duration::from_millis(100)) {}
        }
        Self::new(park, park)
    }
}

impl std::fmt::Debug for WorkerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSet").finish_non_exhaustive()
    }
}

/// How a worker ended when it was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Returned within the grace period and was joined
    Joined,
    /// Panicked; the panic was contained in its thread
    Panicked,
    /// Did not return in time and was detached
    Detached,
}

struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// Handle to one running worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    join: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
}

impl WorkerHandle {
    /// Start a worker thread
    pub fn spawn(
        worker: Arc<dyn Worker>,
        ctx: WorkerContext,
        stack_size: Option<usize>,
    ) -> Result<Self> {
        let name = ctx.name;
        let (done_tx, done_rx) = bounded(1);

        let mut builder = std::thread::Builder::new().name(name.to_string());
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let join = builder
            .spawn(move || {
                let _done = DoneGuard(done_tx);
                tracing::debug!("Worker '{}' started", ctx.name);
                worker.run(ctx);
                tracing::debug!("Worker '{}' returned", name);
            })
            .map_err(|e| ControllerError::Spawn {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name,
            join: Some(join),
            done_rx,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.join.as_ref().map(|j| j.thread().id())
    }

    /// True once the worker body has returned or panicked
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait up to `grace` for the worker to finish, then join or detach it.
    /// The worker must already have been asked to stop.
    pub fn stop(mut self, grace: Duration) -> WorkerExit {
        let Some(join) = self.join.take() else {
            return WorkerExit::Joined;
        };

        match self.done_rx.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match join.join() {
                Ok(()) => WorkerExit::Joined,
                Err(_) => {
                    tracing::error!("Worker '{}' panicked", self.name);
                    WorkerExit::Panicked
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Worker '{}' did not stop within {:?}, detaching it",
                    self.name,
                    grace
                );
                WorkerExit::Detached
            }
        }
    }
}

/// Both running workers and the token that cancels them
#[derive(Debug)]
pub struct WorkerHandles {
    cancel: CancelToken,
    hw_management: WorkerHandle,
    process_logic: WorkerHandle,
}

impl WorkerHandles {
    /// Start both workers against the given topology and gate
    pub fn spawn(
        workers: &WorkerSet,
        topology: &SharedTopology,
        gate: &ResourceGate,
        parent: &CancelToken,
        stack_size: Option<usize>,
    ) -> Result<Self> {
        let cancel = parent.new_child();
        // Generation 0 never exists: workers started without primitives get none
        let gate = gate.bind(gate.generation().unwrap_or(0));
        let ctx = |name| WorkerContext {
            name,
            topology: topology.clone(),
            gate: gate.clone(),
            cancel: cancel.clone(),
        };

        let hw_management = WorkerHandle::spawn(
            workers.hw_management.clone(),
            ctx(HW_MANAGEMENT),
            stack_size,
        )?;

        let process_logic = match WorkerHandle::spawn(
            workers.process_logic.clone(),
            ctx(PROCESS_LOGIC),
            stack_size,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                hw_management.stop(Duration::from_millis(100));
                return Err(e);
            }
        };

        Ok(Self {
            cancel,
            hw_management,
            process_logic,
        })
    }

    pub fn hw_management(&self) -> &WorkerHandle {
        &self.hw_management
    }

    pub fn process_logic(&self) -> &WorkerHandle {
        &self.process_logic
    }

    /// Cancel both workers and wait up to `grace` for each
    pub fn stop(self, grace: Duration) -> [WorkerExit; 2] {
        self.cancel.cancel();
        [
            self.hw_management.stop(grace),
            self.process_logic.stop(grace),
        ]
    }
}
