//! Multi-shot event adapters and the generation-tagged slots that own them
//!
//! Each handler slot of a stream (data, end, exception, drain, close) is an
//! [`EventSlot`]. Registering a handler produces an [`EventAdapter`] tagged with
//! a fresh generation and makes that generation the slot's active one. An
//! adapter only calls into the foreign side while its generation is active, so
//! a host that still holds a superseded adapter gets a no-op.
//!
//! Registration and delivery both take the context's entry gate. A delivery
//! racing a re-registration therefore either completes before the replacement
//! or observes the new generation.

use crate::callable::CallableHandle;
use crate::error::{BridgeError, Result};
use crate::foreign::{BridgeContext, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Generation value that never matches a live adapter
const CLEARED: u64 = 0;

#[derive(Debug)]
struct Generations {
    next: AtomicU64,
    active: AtomicU64,
}

/// One handler slot of a stream
#[derive(Debug)]
pub struct EventSlot {
    site: String,
    context: BridgeContext,
    generations: Arc<Generations>,
}

impl EventSlot {
    /// Create an empty slot; `site` names it in diagnostics (e.g. `AsyncFile::handler`)
    pub fn new(context: &BridgeContext, site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            context: context.clone(),
            generations: Arc::new(Generations {
                next: AtomicU64::new(CLEARED + 1),
                active: AtomicU64::new(CLEARED),
            }),
        }
    }

    /// Slot name
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Currently active generation, 0 when the slot is empty
    #[must_use]
    pub fn active_generation(&self) -> u64 {
        self.generations.active.load(Ordering::Acquire)
    }

    /// Register `handler`, or clear the slot with `None`
    ///
    /// The handle is validated before anything changes: a non-callable value
    /// leaves the previous registration in place. Any adapter handed out
    /// earlier is invalidated once this returns.
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable value, or `ContextClosed` if
    /// the foreign context is gone.
    pub fn register(&self, handler: Option<&Value>) -> Result<Option<EventAdapter>> {
        let handle = handler
            .map(|value| self.context.handle(value, &self.site))
            .transpose()?;
        let foreign = self.context.foreign().ok_or(BridgeError::ContextClosed)?;

        Ok(foreign.enter(|| {
            let generation = self.generations.next.fetch_add(1, Ordering::AcqRel);
            match handle {
                Some(handle) => {
                    self.generations.active.store(generation, Ordering::Release);
                    debug!("{}: registered handler generation {}", self.site, generation);
                    Some(EventAdapter {
                        handle,
                        generation,
                        generations: Arc::clone(&self.generations),
                    })
                }
                None => {
                    self.generations.active.store(CLEARED, Ordering::Release);
                    debug!("{}: cleared handler", self.site);
                    None
                }
            }
        }))
    }

    /// Invalidate every adapter handed out so far
    pub fn clear(&self) {
        match self.context.foreign() {
            Some(foreign) => foreign.enter(|| self.invalidate()),
            None => self.invalidate(),
        }
    }

    fn invalidate(&self) {
        self.generations.active.store(CLEARED, Ordering::Release);
    }
}

/// Adapter the host invokes once per event
#[derive(Debug, Clone)]
pub struct EventAdapter {
    handle: CallableHandle,
    generation: u64,
    generations: Arc<Generations>,
}

impl EventAdapter {
    /// Generation this adapter was registered under
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this adapter is still the slot's active registration
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generations.active.load(Ordering::Acquire) == self.generation
    }

    /// Deliver one event
    ///
    /// Returns `true` if the foreign handler was called. A superseded adapter
    /// or a closed context delivers nothing; foreign exceptions are logged and
    /// counted but never reach the host.
    pub fn fire(&self, args: &[Value]) -> bool {
        let stats = self.handle.context().stats();
        let Some(foreign) = self.handle.context().foreign() else {
            debug!("{}: foreign context closed, event dropped", self.handle.site());
            return false;
        };

        foreign.enter(|| {
            if !self.is_current() {
                stats.increment_stale_events();
                debug!(
                    "{}: stale handler generation {} suppressed",
                    self.handle.site(),
                    self.generation
                );
                return false;
            }
            let delivered = self.handle.notify(args);
            if delivered {
                stats.increment_events_delivered();
            }
            delivered
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::{ForeignContext, NativeFunction};
    use crate::stats::BridgeStats;
    use std::sync::Mutex;

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<(&'static str, Value)>>>) -> Value {
        let log = Arc::clone(log);
        NativeFunction::value(tag, move |args| {
            log.lock().unwrap().push((tag, args[0].clone()));
            Ok(Value::Null)
        })
    }

    #[test]
    fn test_not_callable_leaves_slot_untouched() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let slot = EventSlot::new(&context, "Stream::handler");
        let log = Arc::new(Mutex::new(Vec::new()));

        let adapter = slot.register(Some(&recorder("a", &log))).unwrap().unwrap();
        let err = slot.register(Some(&Value::Int(1))).unwrap_err();
        assert!(matches!(err, BridgeError::NotCallable { .. }));

        assert!(adapter.is_current());
        assert!(adapter.fire(&[Value::Int(7)]));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_replacement_silences_old_adapter() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let slot = EventSlot::new(&context, "Stream::handler");
        let log = Arc::new(Mutex::new(Vec::new()));

        let old = slot.register(Some(&recorder("old", &log))).unwrap().unwrap();
        let new = slot.register(Some(&recorder("new", &log))).unwrap().unwrap();
        assert!(new.generation() > old.generation());

        assert!(!old.fire(&[Value::Int(1)]));
        assert!(new.fire(&[Value::Int(2)]));
        assert_eq!(*log.lock().unwrap(), vec![("new", Value::Int(2))]);
        assert_eq!(context.stats().stale_events(), 1);
        assert_eq!(context.stats().events_delivered(), 1);
    }

    #[test]
    fn test_clear_invalidates() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let slot = EventSlot::new(&context, "Stream::handler");
        let log = Arc::new(Mutex::new(Vec::new()));

        let adapter = slot.register(Some(&recorder("a", &log))).unwrap().unwrap();
        assert!(slot.register(None).unwrap().is_none());
        assert_eq!(slot.active_generation(), 0);
        assert!(!adapter.fire(&[Value::Null]));

        let again = slot.register(Some(&recorder("b", &log))).unwrap().unwrap();
        slot.clear();
        assert!(!again.fire(&[Value::Null]));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_may_reregister_itself() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let slot = Arc::new(EventSlot::new(&context, "Stream::handler"));
        let log = Arc::new(Mutex::new(Vec::new()));

        let replacement = recorder("second", &log);
        let inner_slot = Arc::clone(&slot);
        let first = NativeFunction::value("first", move |_| {
            // Re-entering the gate from inside a delivery must not deadlock
            inner_slot
                .register(Some(&replacement))
                .map(|_| Value::Null)
                .map_err(|e| crate::foreign::ForeignException::new("bridge", e.to_string()))
        });

        let adapter = slot.register(Some(&first)).unwrap().unwrap();
        assert!(adapter.fire(&[Value::Null]));
        assert!(!adapter.is_current());
        assert!(!adapter.fire(&[Value::Null]));
    }

    #[test]
    fn test_closed_context_drops_events() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let slot = EventSlot::new(&context, "Stream::handler");
        let log = Arc::new(Mutex::new(Vec::new()));
        let adapter = slot.register(Some(&recorder("a", &log))).unwrap().unwrap();

        drop(foreign);
        assert!(!adapter.fire(&[Value::Null]));
        assert!(matches!(
            slot.register(Some(&recorder("b", &log))),
            Err(BridgeError::ContextClosed)
        ));
    }
}
