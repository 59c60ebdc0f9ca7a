//! Validated reference to a foreign callable
//!
//! A `CallableHandle` is the only way the bridge calls into the foreign side.
//! It is checked once, when a handler is registered, and from then on every
//! invocation goes through the context's entry gate.

use crate::error::{BridgeError, Result};
use crate::foreign::{BridgeContext, ForeignException, Invokable, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// A foreign callable bound to its context
#[derive(Clone)]
pub struct CallableHandle {
    context: BridgeContext,
    callable: Arc<dyn Invokable>,
    site: Arc<str>,
}

impl CallableHandle {
    /// Validate `value` as a handler registered at `site`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `value` is not a foreign callable.
    pub fn new(context: &BridgeContext, value: &Value, site: &str) -> Result<Self> {
        match value {
            Value::Callable(callable) => Ok(Self {
                context: context.clone(),
                callable: Arc::clone(callable),
                site: Arc::from(site),
            }),
            other => Err(BridgeError::NotCallable {
                site: site.to_string(),
                found: other.type_name(),
            }),
        }
    }

    /// Registration site, e.g. `FileSystem::exists`
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Bridge context the handle belongs to
    #[must_use]
    pub const fn context(&self) -> &BridgeContext {
        &self.context
    }

    /// Invoke inside the foreign context's entry gate
    ///
    /// A panic inside the callable is caught and reported as a foreign
    /// exception of kind `panic`; the gate is released either way.
    ///
    /// # Errors
    ///
    /// Returns `ContextClosed` if the foreign context is gone, or `Foreign`
    /// with the exception the callable raised.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        let foreign = self.context.foreign().ok_or(BridgeError::ContextClosed)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            foreign.enter(|| self.callable.invoke(args))
        }));
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(exception)) => Err(BridgeError::Foreign(exception)),
            Err(payload) => Err(BridgeError::Foreign(ForeignException::from_panic(&*payload))),
        }
    }

    /// Invoke on behalf of the host and absorb the outcome
    ///
    /// The host must never see a foreign failure: exceptions are logged at
    /// `warn` and counted, a closed context is logged at `debug`. Returns
    /// whether the callable ran to completion.
    pub fn notify(&self, args: &[Value]) -> bool {
        match self.invoke(args) {
            Ok(_) => true,
            Err(BridgeError::Foreign(exception)) => {
                self.context.stats().increment_foreign_exceptions();
                warn!("{}(): handler raised {}", self.site, exception);
                false
            }
            Err(BridgeError::ContextClosed) => {
                debug!("{}(): foreign context closed, dropping delivery", self.site);
                false
            }
            Err(e) => {
                warn!("{}(): delivery failed: {}", self.site, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for CallableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableHandle")
            .field("site", &self.site)
            .field("callable", &self.callable.name())
            .finish_non_exhaustive()
    }
}
