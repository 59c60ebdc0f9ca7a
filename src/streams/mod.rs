//! Flow-controlled stream capabilities exposed to the foreign side
//!
//! [`ReadStream`] and [`WriteStream`] are implemented once, generically, for
//! every facade that wraps a host stream (see [`StreamFacade`]). The bridge
//! forwards pause/resume and queue-size calls to the host and keeps no data
//! buffer of its own: what happens to data arriving while paused is decided by
//! the host.
//!
//! # Architecture
//!
//! Each module owns its configuration:
//! - `StreamOptions` - Chunking and default queue size for host streams (owned by this module)
//! - `Stream` - Runtime bridge that uses the options

mod bridge;

pub use bridge::{Stream, StreamFacade};

use crate::error::Result;
use crate::foreign::Value;
use compio_host_io::file::DEFAULT_CHUNK_SIZE;
use compio_host_io::queue::DEFAULT_MAX_SIZE;
use std::num::NonZeroUsize;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Stream configuration options
///
/// Uses `NonZeroUsize` to guarantee the read chunk size is at least 1.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Bytes per read delivered to the data handler
    read_chunk_size: NonZeroUsize,
    /// Initial write-queue high-water mark
    write_queue_max_size: usize,
}

impl StreamOptions {
    /// Create stream options
    ///
    /// # Arguments
    ///
    /// * `read_chunk_size` - Bytes per read (clamped to >= 1)
    /// * `write_queue_max_size` - Initial write-queue high-water mark in bytes
    #[must_use]
    pub fn new(read_chunk_size: usize, write_queue_max_size: usize) -> Self {
        let read_chunk_size = NonZeroUsize::new(read_chunk_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            read_chunk_size,
            write_queue_max_size,
        }
    }

    /// Get the read chunk size
    #[must_use]
    pub const fn read_chunk_size(&self) -> usize {
        self.read_chunk_size.get()
    }

    /// Get the initial write-queue high-water mark
    #[must_use]
    pub const fn write_queue_max_size(&self) -> usize {
        self.write_queue_max_size
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_MAX_SIZE)
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Read side of a flow-controlled stream
///
/// Handlers are foreign callables; `None` clears a handler.
pub trait ReadStream {
    /// Set the handler receiving each data chunk as `Bytes`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable; nothing is attached then.
    fn data_handler(&self, handler: Option<&Value>) -> Result<()>;

    /// Set the handler fired once at end of stream with `Null`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable.
    fn end_handler(&self, handler: Option<&Value>) -> Result<()>;

    /// Set the handler receiving stream errors as `Value::Error`
    ///
    /// Errors raised while no exception handler is set are dropped silently.
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable.
    fn exception_handler(&self, handler: Option<&Value>) -> Result<()>;

    /// Stop data delivery until [`resume`](Self::resume)
    fn pause(&self);

    /// Continue data delivery
    fn resume(&self);
}

/// Write side of a flow-controlled stream
pub trait WriteStream {
    /// Queue `data` (`Bytes` or `Str`) for writing; never blocks
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `data` is neither bytes nor a string.
    fn write(&self, data: Value) -> Result<()>;

    /// Set the write-queue high-water mark in bytes
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `max` is negative.
    fn write_queue_max_size(&self, max: i64) -> Result<()>;

    /// Whether the host write queue is at or above its high-water mark
    fn write_queue_full(&self) -> bool;

    /// Set the handler fired with `Null` when a full queue drains
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable.
    fn drain_handler(&self, handler: Option<&Value>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_options_clamp_chunk_size() {
        let options = StreamOptions::new(0, 16);
        assert_eq!(options.read_chunk_size(), 1);
        assert_eq!(options.write_queue_max_size(), 16);
    }

    #[test]
    fn test_stream_options_default() {
        let options = StreamOptions::default();
        assert_eq!(options.read_chunk_size(), 8 * 1024);
        assert_eq!(options.write_queue_max_size(), DEFAULT_MAX_SIZE);
    }
}
