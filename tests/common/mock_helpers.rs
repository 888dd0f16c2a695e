//! Worker and controller helpers

use hand_reconfig::config::{ControllerConfig, LifecycleConfig};
use hand_reconfig::lifecycle::{GateClosed, WorkerContext, WorkerSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

/// Controller configuration with short timings
pub fn fast_config() -> ControllerConfig {
    ControllerConfig {
        lifecycle: LifecycleConfig {
            settling_interval_ms: 10,
            worker_grace_period_ms: 2000,
            worker_stack_size: None,
        },
        ..ControllerConfig::default()
    }
}

/// What the recording workers observed
#[derive(Debug, Default)]
pub struct WorkerLog {
    /// Thread ids in start order
    pub started: Mutex<Vec<(&'static str, ThreadId)>>,
    /// Guarded sections completed
    pub sections: AtomicUsize,
    /// Entries refused because the primitives were gone outright
    pub destroyed_refusals: AtomicUsize,
}

impl WorkerLog {
    pub fn starts(&self) -> Vec<(&'static str, ThreadId)> {
        self.started.lock().unwrap().clone()
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

/// Workers that record their starts and keep touching the topology and the
/// shared blobs until cancelled
pub fn recording_workers() -> (WorkerSet, Arc<WorkerLog>) {
    stalling_workers(0, Duration::ZERO)
}

/// Like [`recording_workers`], but the first `stalls` workers to start hang
/// inside their first guarded section for `hang`, ignoring cancellation
pub fn stalling_workers(stalls: usize, hang: Duration) -> (WorkerSet, Arc<WorkerLog>) {
    let log = Arc::new(WorkerLog::default());
    let body = {
        let log = log.clone();
        move |ctx: WorkerContext| {
            let index = {
                let mut started = log.started.lock().unwrap();
                started.push((ctx.name, std::thread::current().id()));
                started.len() - 1
            };
            if index < stalls {
                let _ = ctx.gate.with_state(|_| std::thread::sleep(hang));
                return;
            }

            while !ctx.cancel.is_cancelled() {
                let inputs = ctx.topology.read().inputs().len();
                match ctx.gate.with_state(|state| state.push(inputs as u8)) {
                    Ok(()) => {
                        log.sections.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(GateClosed::Destroyed) => {
                        log.destroyed_refusals.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(GateClosed::TearingDown) => {}
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    };
    (WorkerSet::new(body.clone(), body), log)
}
