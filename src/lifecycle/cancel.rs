//! Cooperative cancellation for worker threads
//!
//! Workers are never killed. They poll a [`CancelToken`] at their safe points
//! and return once it reports cancelled. Tokens form a tree: the controller
//! holds a root, each worker pair gets a child of it, and cancelling any node
//! cancels everything below it.
//!
//! A token is its own flag plus the flags of every ancestor, so checking it
//! never walks a chain of parents.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest a [`CancelToken::sleep_cancellable`] goes without looking at the flags
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type Flag = Arc<AtomicBool>;

/// Hierarchical cancellation token
#[derive(Clone)]
pub struct CancelToken {
    own: Flag,
    ancestors: Arc<[Flag]>,
}

impl CancelToken {
    /// A token with no parent
    pub fn new_root() -> Self {
        Self {
            own: Flag::default(),
            ancestors: Arc::from(Vec::new()),
        }
    }

    /// A token cancelled by this one, but not the other way around
    pub fn new_child(&self) -> Self {
        let ancestors: Vec<Flag> = self
            .ancestors
            .iter()
            .cloned()
            .chain(std::iter::once(self.own.clone()))
            .collect();
        Self {
            own: Flag::default(),
            ancestors: ancestors.into(),
        }
    }

    /// Cancel this token, its clones and every descendant
    pub fn cancel(&self) {
        self.own.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::SeqCst)
            || self.ancestors.iter().any(|f| f.load(Ordering::SeqCst))
    }

    /// Nesting depth; a root is 0
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Sleep for `total` unless cancelled first.
    /// Returns false if the token was cancelled.
    pub fn sleep_cancellable(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        while !self.is_cancelled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(POLL_INTERVAL));
        }
        false
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new_root()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("depth", &self.depth())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
