//! Single-shot completion adapter
//!
//! Wraps a [`CallableHandle`] for one asynchronous host operation. The host
//! reports the outcome once; the adapter marshals it and calls the foreign
//! handler with exactly one argument:
//! - success of a void operation: `Null`
//! - success with a value: that value
//! - failure: `Value::Error { kind, message }`
//!
//! Failures are data for the handler, not exceptions in the foreign context.

use crate::callable::CallableHandle;
use crate::error::{BridgeError, Result};
use crate::foreign::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// How a successful result is marshalled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// The operation yields nothing; the handler receives `Null`
    Void,
    /// The operation yields a value; the handler receives it
    Value,
}

/// Adapter for exactly one completion
#[derive(Debug)]
pub struct CompletionAdapter {
    handle: CallableHandle,
    shape: ResultShape,
    fired: AtomicBool,
}

impl CompletionAdapter {
    /// Wrap `handle` for an operation with the given result shape
    #[must_use]
    pub const fn new(handle: CallableHandle, shape: ResultShape) -> Self {
        Self {
            handle,
            shape,
            fired: AtomicBool::new(false),
        }
    }

    /// Registration site of the wrapped handler
    #[must_use]
    pub fn site(&self) -> &str {
        self.handle.site()
    }

    /// Result shape of the operation
    #[must_use]
    pub const fn shape(&self) -> ResultShape {
        self.shape
    }

    /// Whether the completion has fired
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Report success
    ///
    /// # Errors
    ///
    /// Returns `DoubleCompletion` if the adapter already fired; nothing is
    /// delivered in that case.
    pub fn on_success(&self, value: Value) -> Result<()> {
        self.claim()?;
        let arg = match self.shape {
            ResultShape::Void => Value::Null,
            ResultShape::Value => value,
        };
        self.deliver(arg);
        Ok(())
    }

    /// Report failure
    ///
    /// # Errors
    ///
    /// Returns `DoubleCompletion` if the adapter already fired.
    pub fn on_failure(&self, error: &io::Error) -> Result<()> {
        self.claim()?;
        debug!("{}() failed: {}", self.handle.site(), error);
        self.handle.context().stats().increment_host_failures();
        self.deliver(Value::from_io_error(error));
        Ok(())
    }

    /// Report an outcome
    ///
    /// # Errors
    ///
    /// Returns `DoubleCompletion` if the adapter already fired.
    pub fn complete(&self, outcome: io::Result<Value>) -> Result<()> {
        match outcome {
            Ok(value) => self.on_success(value),
            Err(e) => self.on_failure(&e),
        }
    }

    fn claim(&self) -> Result<()> {
        if self.fired.swap(true, Ordering::AcqRel) {
            self.handle.context().stats().increment_double_completions();
            error!(
                "{}(): host completed the operation twice, second completion dropped",
                self.handle.site()
            );
            return Err(BridgeError::DoubleCompletion {
                site: self.handle.site().to_string(),
            });
        }
        Ok(())
    }

    fn deliver(&self, arg: Value) {
        if self.handle.notify(&[arg]) {
            self.handle.context().stats().increment_completions_delivered();
        }
    }
}
