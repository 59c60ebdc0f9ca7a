//! Statistics tracking for bridge deliveries
//!
//! This module provides lock-free atomic statistics tracking using `BridgeStats`.
//! Counters can be shared across the event loop and pool threads without
//! requiring mutexes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Single-shot completions delivered to a foreign handler
    pub completions_delivered: u64,
    /// Host operations that completed with an error value
    pub host_failures: u64,
    /// Multi-shot events delivered to a foreign handler
    pub events_delivered: u64,
    /// Events suppressed because their handler had been replaced
    pub stale_events: u64,
    /// Exceptions raised by foreign handlers (including panics)
    pub foreign_exceptions: u64,
    /// Completions the host attempted to fire twice
    pub double_completions: u64,
}

/// Delivery counters with interior mutability via atomics
///
/// Wrap in `Arc<BridgeStats>` to share between adapters.
///
/// # Thread Safety
///
/// All methods are thread-safe and lock-free. Atomic operations use `Ordering::Relaxed`
/// since statistics counters don't require synchronization (eventual consistency is fine).
#[derive(Debug, Default)]
pub struct BridgeStats {
    completions_delivered: AtomicU64,
    host_failures: AtomicU64,
    events_delivered: AtomicU64,
    stale_events: AtomicU64,
    foreign_exceptions: AtomicU64,
    double_completions: AtomicU64,
}

impl BridgeStats {
    /// Create zeroed counters
    #[must_use]
    pub const fn new() -> Self {
        Self {
            completions_delivered: AtomicU64::new(0),
            host_failures: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            stale_events: AtomicU64::new(0),
            foreign_exceptions: AtomicU64::new(0),
            double_completions: AtomicU64::new(0),
        }
    }

    /// Get the number of completions delivered (lock-free atomic read)
    #[must_use]
    pub fn completions_delivered(&self) -> u64 {
        self.completions_delivered.load(Ordering::Relaxed)
    }

    /// Get the number of failed host operations (lock-free atomic read)
    #[must_use]
    pub fn host_failures(&self) -> u64 {
        self.host_failures.load(Ordering::Relaxed)
    }

    /// Get the number of events delivered (lock-free atomic read)
    #[must_use]
    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    /// Get the number of stale events suppressed (lock-free atomic read)
    #[must_use]
    pub fn stale_events(&self) -> u64 {
        self.stale_events.load(Ordering::Relaxed)
    }

    /// Get the number of foreign exceptions (lock-free atomic read)
    #[must_use]
    pub fn foreign_exceptions(&self) -> u64 {
        self.foreign_exceptions.load(Ordering::Relaxed)
    }

    /// Get the number of double completions (lock-free atomic read)
    #[must_use]
    pub fn double_completions(&self) -> u64 {
        self.double_completions.load(Ordering::Relaxed)
    }

    /// Increment the completions counter (lock-free atomic operation)
    pub fn increment_completions_delivered(&self) {
        self.completions_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the host failure counter (lock-free atomic operation)
    pub fn increment_host_failures(&self) {
        self.host_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the events counter (lock-free atomic operation)
    pub fn increment_events_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the stale event counter (lock-free atomic operation)
    pub fn increment_stale_events(&self) {
        self.stale_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the foreign exception counter (lock-free atomic operation)
    pub fn increment_foreign_exceptions(&self) {
        self.foreign_exceptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the double completion counter (lock-free atomic operation)
    pub fn increment_double_completions(&self) {
        self.double_completions.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completions_delivered: self.completions_delivered(),
            host_failures: self.host_failures(),
            events_delivered: self.events_delivered(),
            stale_events: self.stale_events(),
            foreign_exceptions: self.foreign_exceptions(),
            double_completions: self.double_completions(),
        }
    }
}
