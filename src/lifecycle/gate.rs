//! Shared primitives guarding the worker blobs
//!
//! Workers exchange two blobs: `state` and `payload`, each behind its own
//! mutex. The controller owns the lifecycle of those mutexes, not their
//! contents. Workers never hold a mutex directly; they go through a
//! [`ResourceGate`], which refuses entry while a teardown is flagged or after
//! the primitives have been destroyed.
//!
//! # Generations
//!
//! Every [`ResourceGate::create`] produces a new generation of primitives.
//! Workers receive a gate [bound](ResourceGate::bind) to the generation that
//! was live when they were spawned, so a worker left over from an earlier
//! cycle is refused entry to primitives created after it.
//!
//! # Fencing
//!
//! A worker inside [`ResourceGate::with_state`] or
//! [`ResourceGate::with_payload`] holds a reference to its generation.
//! [`ResourceGate::destroy`] unpublishes the generation, then waits a bounded
//! time for those references to be released. If the wait runs out the
//! generation is abandoned to whoever still holds it; it is never handed to
//! another worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Opaque blob exchanged between workers
pub type Blob = Vec<u8>;

/// Why a worker was refused access to the primitives
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateClosed {
    #[error("shared primitives are being torn down")]
    TearingDown,
    #[error("shared primitives do not exist")]
    Destroyed,
}

/// What [`ResourceGate::destroy`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestroyOutcome {
    /// There were no primitives
    #[default]
    Nothing,
    /// Destroyed after every guarded section was left
    Destroyed,
    /// Still in use when the wait ran out; left to the holders
    Abandoned,
}

impl DestroyOutcome {
    /// True if a generation existed and is no longer reachable
    pub fn released(&self) -> bool {
        !matches!(self, DestroyOutcome::Nothing)
    }
}

/// The two mutex-guarded blobs of one generation
#[derive(Debug)]
pub struct SharedResources {
    generation: u64,
    state: Mutex<Blob>,
    payload: Mutex<Blob>,
}

impl SharedResources {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            state: Mutex::new(Blob::new()),
            payload: Mutex::new(Blob::new()),
        }
    }
}

#[derive(Debug, Default)]
struct GateInner {
    tearing_down: AtomicBool,
    resources: RwLock<Option<Arc<SharedResources>>>,
    generations: AtomicU64,
}

/// Acquisition gate in front of the shared primitives
#[derive(Debug, Clone, Default)]
pub struct ResourceGate {
    inner: Arc<GateInner>,
    bound: Option<u64>,
}

impl ResourceGate {
    /// A gate with no primitives yet
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the same gate that only admits the given generation
    pub fn bind(&self, generation: u64) -> Self {
        Self {
            inner: self.inner.clone(),
            bound: Some(generation),
        }
    }

    /// Generation this handle is restricted to, if any
    pub fn bound_generation(&self) -> Option<u64> {
        self.bound
    }

    /// Create fresh primitives and reopen the gate. Returns their generation.
    pub fn create(&self) -> u64 {
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *self
            .inner
            .resources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(Arc::new(SharedResources::new(generation)));
        self.inner.tearing_down.store(false, Ordering::SeqCst);
        tracing::debug!("Shared primitives created (generation {})", generation);
        generation
    }

    /// Flag the primitives for destruction; new entries are refused from now on
    pub fn begin_teardown(&self) {
        self.inner.tearing_down.store(true, Ordering::SeqCst);
    }

    pub fn is_tearing_down(&self) -> bool {
        self.inner.tearing_down.load(Ordering::SeqCst)
    }

    /// Destroy the primitives, waiting at most `wait` for workers still
    /// inside a guarded section.
    pub fn destroy(&self, wait: Duration) -> DestroyOutcome {
        self.begin_teardown();
        let Some(resources) = self
            .inner
            .resources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        else {
            return DestroyOutcome::Nothing;
        };

        let deadline = Instant::now() + wait;
        while Arc::strong_count(&resources) > 1 {
            if Instant::now() >= deadline {
                tracing::error!(
                    "Shared primitives (generation {}) still in use after {:?}, abandoning them",
                    resources.generation,
                    wait
                );
                return DestroyOutcome::Abandoned;
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        tracing::debug!(
            "Shared primitives destroyed (generation {})",
            resources.generation
        );
        DestroyOutcome::Destroyed
    }

    /// True while primitives exist and the gate is open
    pub fn is_live(&self) -> bool {
        !self.is_tearing_down() && self.generation().is_some()
    }

    /// Generation of the current primitives, if any
    pub fn generation(&self) -> Option<u64> {
        self.current().map(|r| r.generation)
    }

    /// Run `f` with the state blob locked
    pub fn with_state<R>(&self, f: impl FnOnce(&mut Blob) -> R) -> Result<R, GateClosed> {
        let resources = self.enter()?;
        let mut state = resources
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&mut state))
    }

    /// Run `f` with the payload blob locked
    pub fn with_payload<R>(&self, f: impl FnOnce(&mut Blob) -> R) -> Result<R, GateClosed> {
        let resources = self.enter()?;
        let mut payload = resources
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&mut payload))
    }

    /// Run `f` with both blobs locked, always state first
    pub fn with_both<R>(
        &self,
        f: impl FnOnce(&mut Blob, &mut Blob) -> R,
    ) -> Result<R, GateClosed> {
        let resources = self.enter()?;
        let mut state = resources
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut payload = resources
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&mut state, &mut payload))
    }

    fn enter(&self) -> Result<Arc<SharedResources>, GateClosed> {
        if self.is_tearing_down() {
            return Err(GateClosed::TearingDown);
        }
        let resources = self.current().ok_or(GateClosed::Destroyed)?;
        if self.bound.is_some_and(|g| g != resources.generation) {
            return Err(GateClosed::Destroyed);
        }
        // The flag may have been raised while we took our reference
        if self.is_tearing_down() {
            return Err(GateClosed::TearingDown);
        }
        Ok(resources)
    }

    fn current(&self) -> Option<Arc<SharedResources>> {
        self.inner
            .resources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_new_gate_has_no_primitives() {
        let gate = ResourceGate::new();
        assert!(!gate.is_live());
        assert_eq!(gate.generation(), None);
        assert_eq!(gate.with_state(|_| ()), Err(GateClosed::Destroyed));
    }

    #[test]
    fn test_create_and_use() {
        let gate = ResourceGate::new();
        assert_eq!(gate.create(), 1);
        assert!(gate.is_live());

        gate.with_state(|s| s.extend_from_slice(b"on")).unwrap();
        gate.with_payload(|p| p.push(7)).unwrap();
        let (s, p) = gate.with_both(|s, p| (s.clone(), p.clone())).unwrap();
        assert_eq!(s, b"on");
        assert_eq!(p, vec![7]);
    }

    #[test]
    fn test_teardown_refuses_entry() {
        let gate = ResourceGate::new();
        gate.create();
        gate.begin_teardown();

        assert_eq!(gate.with_state(|_| ()), Err(GateClosed::TearingDown));
        assert_eq!(gate.with_payload(|_| ()), Err(GateClosed::TearingDown));
    }

    #[test]
    fn test_destroy_then_recreate_gives_fresh_blobs() {
        let gate = ResourceGate::new();
        gate.create();
        gate.with_state(|s| s.push(1)).unwrap();

        assert_eq!(gate.destroy(WAIT), DestroyOutcome::Destroyed);
        assert_eq!(gate.destroy(WAIT), DestroyOutcome::Nothing);
        assert_eq!(gate.generation(), None);

        assert_eq!(gate.create(), 2);
        assert!(gate.with_state(|s| s.is_empty()).unwrap());
    }

    #[test]
    fn test_destroy_waits_for_worker_inside_section() {
        let gate = ResourceGate::new();
        gate.create();

        let (entered_tx, entered_rx) = mpsc::channel();
        let worker_gate = gate.clone();
        let worker = std::thread::spawn(move || {
            worker_gate
                .with_state(|s| {
                    entered_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(50));
                    s.push(42);
                })
                .unwrap();
        });

        entered_rx.recv().unwrap();
        assert_eq!(gate.destroy(WAIT), DestroyOutcome::Destroyed);
        // destroy() returned, so the worker must have left its section
        worker.join().unwrap();
        assert_eq!(gate.with_state(|_| ()), Err(GateClosed::TearingDown));
    }

    #[test]
    fn test_destroy_gives_up_on_stuck_section() {
        let gate = ResourceGate::new();
        let generation = gate.create();

        let (entered_tx, entered_rx) = mpsc::channel();
        let stuck_gate = gate.bind(generation);
        let stuck = std::thread::spawn(move || {
            stuck_gate
                .with_state(|s| {
                    entered_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(500));
                    s.push(1);
                })
                .unwrap();
        });

        entered_rx.recv().unwrap();
        let start = Instant::now();
        assert_eq!(
            gate.destroy(Duration::from_millis(20)),
            DestroyOutcome::Abandoned
        );
        assert!(start.elapsed() < Duration::from_millis(400));

        // The next generation is untouched by the stuck section
        assert_eq!(gate.create(), 2);
        assert!(gate.with_state(|s| s.is_empty()).unwrap());
        stuck.join().unwrap();
        assert!(gate.with_state(|s| s.is_empty()).unwrap());
    }

    #[test]
    fn test_bound_gate_refuses_later_generations() {
        let gate = ResourceGate::new();
        let first = gate.create();
        let old = gate.bind(first);
        old.with_payload(|p| p.push(1)).unwrap();

        gate.destroy(WAIT);
        let second = gate.create();
        assert_eq!(old.with_payload(|_| ()), Err(GateClosed::Destroyed));
        assert_eq!(old.with_state(|_| ()), Err(GateClosed::Destroyed));
        assert!(gate.bind(second).with_payload(|p| p.is_empty()).unwrap());
        assert_eq!(old.bound_generation(), Some(first));
    }
}
