//! # callbridge
//!
//! Drive a compio-based host I/O core from callables that live in a foreign
//! execution environment, without giving up the host's threading model or its
//! backpressure.
//!
//! - [`callable`]: validated references to foreign callables
//! - [`completion`]: single-shot adapters for async operations
//! - [`events`]: multi-shot, generation-tagged adapters for stream events
//! - [`streams`]: flow-controlled read/write capabilities
//! - [`executor`]: event-loop or thread-pool delivery
//! - [`fs`] and [`http`]: the facades foreign code calls
//!
//! ## Example
//!
//! ```rust,no_run
//! use callbridge::foreign::{BridgeContext, ForeignContext, NativeFunction, Value};
//! use callbridge::{BridgeStats, Executor, FileSystem};
//! use std::sync::Arc;
//!
//! # #[compio::main]
//! # async fn main() -> callbridge::Result<()> {
//! let foreign = ForeignContext::new("main");
//! let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
//! // Event-loop operations run on the calling thread's compio runtime
//! let fs = FileSystem::new(&context, Executor::EventLoop);
//!
//! let handler = NativeFunction::value("print", |args| {
//!     println!("{}", args[0]);
//!     Ok(Value::Null)
//! });
//! fs.exists("Cargo.toml", &handler)?;
//! # Ok(())
//! # }
//! ```

pub mod callable;
pub mod cli;
pub mod completion;
pub mod error;
pub mod events;
pub mod executor;
pub mod foreign;
pub mod fs;
pub mod http;
pub mod stats;
pub mod streams;

// Re-export main types
pub use callable::CallableHandle;
pub use completion::{CompletionAdapter, ResultShape};
pub use error::{BridgeError, Result};
pub use events::{EventAdapter, EventSlot};
pub use executor::{ExecutionMode, Executor, ExecutorOptions};
pub use fs::{AsyncFile, FileSystem};
pub use http::WebSocket;
pub use stats::BridgeStats;
pub use streams::{ReadStream, StreamOptions, WriteStream};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
