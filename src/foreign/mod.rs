//! Model of the foreign execution environment
//!
//! The bridge never sees the foreign runtime directly. It sees:
//! - [`Value`]: the foreign value representation crossing the boundary
//! - [`Invokable`]: anything the foreign side can call
//! - [`ForeignContext`]: the foreign execution context, entered through its
//!   re-entrant [`EntryGate`]
//!
//! [`NativeFunction`] turns a Rust closure into an `Invokable`, which is how
//! the CLI and the tests play the foreign side.

mod context;
mod convert;
mod native;
mod value;

pub use context::{BridgeContext, EntryGate, ForeignContext, GateGuard};
pub use convert::{FromForeign, IntoForeign};
pub use native::NativeFunction;
pub use value::{ForeignObject, Value};

use std::any::Any;

/// Exception raised by a foreign callable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ForeignException {
    /// Exception class or kind
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl ForeignException {
    /// Create an exception of `kind` with `message`
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Build from a caught panic payload
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new("panic", message)
    }
}

/// A foreign callable
///
/// Implementations are invoked only while the owning context's entry gate is
/// held, so they need not be re-entrant across threads.
pub trait Invokable: Send + Sync {
    /// Call with `args`
    ///
    /// # Errors
    ///
    /// Returns the exception the foreign callable raised.
    fn invoke(&self, args: &[Value]) -> Result<Value, ForeignException>;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        "<anonymous>"
    }
}
