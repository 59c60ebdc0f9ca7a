//! Rust closures as foreign callables

use super::{ForeignException, Invokable, Value};
use std::sync::Arc;

type NativeFn = dyn Fn(&[Value]) -> Result<Value, ForeignException> + Send + Sync;

/// A foreign callable backed by a Rust closure
pub struct NativeFunction {
    name: String,
    f: Box<NativeFn>,
}

impl NativeFunction {
    /// Wrap `f` under `name`
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ForeignException> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }

    /// Wrap `f` as a callable [`Value`]
    pub fn value<F>(name: impl Into<String>, f: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value, ForeignException> + Send + Sync + 'static,
    {
        Self::new(name, f).into_value()
    }

    /// Convert into a callable [`Value`]
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Callable(Arc::new(self))
    }
}

impl Invokable for NativeFunction {
    fn invoke(&self, args: &[Value]) -> Result<Value, ForeignException> {
        (self.f)(args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
