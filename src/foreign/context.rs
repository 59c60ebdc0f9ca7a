//! Foreign execution context and its entry gate

use super::Value;
use crate::callable::CallableHandle;
use crate::error::Result;
use crate::stats::BridgeStats;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Scoped, re-entrant, one-thread-at-a-time gate into a foreign context
///
/// The owning thread may enter again while it holds the gate (a handler that
/// registers another handler, say). Other threads block until the outermost
/// guard is dropped. Guards release on every exit path, including unwinding.
#[derive(Default)]
pub struct EntryGate {
    lock: ReentrantMutex<()>,
}

impl EntryGate {
    /// Create an open gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter, blocking while another thread holds the gate
    pub fn enter(&self) -> GateGuard<'_> {
        GateGuard {
            _guard: self.lock.lock(),
        }
    }

    /// Whether any thread currently holds the gate
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }

    /// Whether the calling thread holds the gate
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock.is_owned_by_current_thread()
    }
}

impl std::fmt::Debug for EntryGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryGate")
            .field("held", &self.is_held())
            .finish()
    }
}

/// Proof of being inside an [`EntryGate`]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

/// A foreign execution context
///
/// Owned by the foreign side. The bridge only ever holds it weakly, so once
/// the owner drops it every pending adapter reports
/// [`ContextClosed`](crate::BridgeError::ContextClosed) instead of calling in.
#[derive(Debug)]
pub struct ForeignContext {
    name: String,
    gate: EntryGate,
}

impl ForeignContext {
    /// Create a context named `name`
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            gate: EntryGate::new(),
        })
    }

    /// Context name, for diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The context's entry gate
    #[must_use]
    pub const fn gate(&self) -> &EntryGate {
        &self.gate
    }

    /// Run `f` inside the gate
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.gate.enter();
        f()
    }
}

/// What every adapter and facade carries: the foreign context (weakly) and
/// the shared counters
#[derive(Debug, Clone)]
pub struct BridgeContext {
    foreign: Weak<ForeignContext>,
    stats: Arc<BridgeStats>,
}

impl BridgeContext {
    /// Bridge into `foreign`, counting into `stats`
    #[must_use]
    pub fn new(foreign: &Arc<ForeignContext>, stats: Arc<BridgeStats>) -> Self {
        debug!("bridging into foreign context '{}'", foreign.name());
        Self {
            foreign: Arc::downgrade(foreign),
            stats,
        }
    }

    /// The foreign context, if it is still alive
    #[must_use]
    pub fn foreign(&self) -> Option<Arc<ForeignContext>> {
        self.foreign.upgrade()
    }

    /// Shared counters
    #[must_use]
    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Validate `value` as a handler registered at `site`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `value` is not a foreign callable.
    pub fn handle(&self, value: &Value, site: &str) -> Result<CallableHandle> {
        CallableHandle::new(self, value, site)
    }
}
