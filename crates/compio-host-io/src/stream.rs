//! Stream source and sink contracts offered by the host core
//!
//! Every stream-like host object exposes handler slots. Setting a handler
//! replaces the previous one atomically, and `None` clears the slot. The host
//! calls handlers from its own execution context and never holds an internal
//! lock while doing so, so a handler may call back into the same object.

use std::io;
use std::sync::Arc;

/// Host-side event handler
///
/// Shared (`Arc`) so that a source can clone the current handler out of its
/// slot and invoke it without holding the slot lock.
pub type Handler<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Read side of a host stream
pub trait ReadSource {
    /// Payload delivered to the data handler
    type Item;

    /// Set or clear the handler receiving data chunks
    fn set_data_handler(&self, handler: Option<Handler<Self::Item>>);

    /// Set or clear the handler fired once at end of stream
    fn set_end_handler(&self, handler: Option<Handler<()>>);

    /// Set or clear the handler receiving stream errors
    ///
    /// Errors raised while no handler is set are dropped.
    fn set_exception_handler(&self, handler: Option<Handler<io::Error>>);

    /// Stop delivering data until `resume`
    fn pause(&self);

    /// Continue delivering data from wherever the source currently is
    fn resume(&self);
}

/// Write side of a host stream
pub trait WriteSink {
    /// Queue `data` for writing; never blocks
    fn write(&self, data: Vec<u8>);

    /// Set the high-water mark of the write queue, in bytes
    fn set_write_queue_max_size(&self, max: usize);

    /// Live view of whether the write queue is at or above the high-water mark
    fn is_write_queue_full(&self) -> bool;

    /// Set or clear the handler fired when a full queue drains to the low-water mark
    fn set_drain_handler(&self, handler: Option<Handler<()>>);
}

/// A single handler slot with clone-out semantics
///
/// Used by the host objects in this crate. `get` clones the current handler so
/// the caller can invoke it after the slot lock is released.
pub(crate) struct HandlerSlot<E> {
    inner: std::sync::Mutex<Option<Handler<E>>>,
}

impl<E> HandlerSlot<E> {
    pub(crate) const fn new() -> Self {
        Self {
            inner: std::sync::Mutex::new(None),
        }
    }

    pub(crate) fn set(&self, handler: Option<Handler<E>>) {
        *self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = handler;
    }

    pub(crate) fn get(&self) -> Option<Handler<E>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Invoke the current handler, if any; returns whether one was set
    pub(crate) fn call(&self, event: E) -> bool {
        match self.get() {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_slot_replace_and_clear() {
        let slot: HandlerSlot<u32> = HandlerSlot::new();
        assert!(!slot.call(1));

        let hits = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&hits);
        slot.set(Some(Arc::new(move |n| {
            first.fetch_add(n as usize, Ordering::SeqCst);
        })));
        assert!(slot.call(2));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        slot.set(None);
        assert!(!slot.is_set());
        assert!(!slot.call(5));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_may_reenter_slot() {
        // The slot lock must not be held while the handler runs
        let slot: Arc<HandlerSlot<()>> = Arc::new(HandlerSlot::new());
        let inner = Arc::clone(&slot);
        slot.set(Some(Arc::new(move |()| {
            inner.set(None);
        })));
        assert!(slot.call(()));
        assert!(!slot.is_set());
    }
}
