//! Error types for the bridge
//!
//! Validation errors are returned to the caller that registered a handler.
//! Runtime failures of async host operations never surface here: they are
//! marshalled into `Value::Error` and delivered to the subscribed handler.

use crate::foreign::ForeignException;
use thiserror::Error;

/// Errors raised by the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A handler argument was not a foreign callable
    #[error("Handler argument to {site}() must be callable, found {found}")]
    NotCallable {
        /// Registration site, e.g. `FileSystem::exists`
        site: String,
        /// Foreign type name of the rejected value
        found: &'static str,
    },

    /// The host completed a single-shot operation more than once
    #[error("Completion for {site}() fired more than once")]
    DoubleCompletion {
        /// Registration site of the completion
        site: String,
    },

    /// An argument was out of range or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The foreign context has been torn down
    #[error("Foreign context is closed")]
    ContextClosed,

    /// The foreign callable raised an exception
    #[error("Foreign exception: {0}")]
    Foreign(#[from] ForeignException),

    /// The executor could not accept a task
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// A synchronous host operation failed
    #[error("Host error: {0}")]
    Host(#[from] std::io::Error),
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
