//! Where async host operations run and where their completions are delivered
//!
//! - `EventLoop`: the operation is spawned on the current compio runtime and
//!   the completion fires on the loop thread.
//! - `Pooled`: the operation is dispatched to a `compio::dispatcher::Dispatcher`
//!   worker and the completion fires on that worker thread.
//!
//! Either way, the foreign handler runs inside the foreign context's entry
//! gate, so the foreign side only ever sees one thread at a time.
//!
//! # Architecture
//!
//! Each module owns its configuration:
//! - `ExecutorOptions` - Execution strategy (owned by this module)
//! - `Executor` - Runtime strategy built from the options

use crate::completion::CompletionAdapter;
use crate::error::{BridgeError, Result};
use crate::foreign::Value;
use compio::dispatcher::Dispatcher;
use compio_host_io::spawn_detached;
use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run on the caller's compio event loop
    EventLoop,
    /// Run on a dispatcher thread pool
    Pooled,
}

/// Executor configuration options
///
/// Uses `NonZeroUsize` to guarantee the pool has at least one worker.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    mode: ExecutionMode,
    worker_threads: NonZeroUsize,
}

impl ExecutorOptions {
    /// Options for the event-loop strategy
    #[must_use]
    pub fn event_loop() -> Self {
        Self {
            mode: ExecutionMode::EventLoop,
            worker_threads: NonZeroUsize::MIN,
        }
    }

    /// Options for the pooled strategy
    ///
    /// # Arguments
    ///
    /// * `worker_threads` - Pool size (0 = one per CPU core)
    #[must_use]
    pub fn pooled(worker_threads: usize) -> Self {
        let threads = if worker_threads == 0 {
            num_cpus::get()
        } else {
            worker_threads
        };
        Self {
            mode: ExecutionMode::Pooled,
            worker_threads: NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Get the execution mode
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Get the pool size (only meaningful for `Pooled`)
    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads.get()
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::event_loop()
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Strategy for running host operations and delivering their completions
#[derive(Clone)]
pub enum Executor {
    /// Spawn on the current compio runtime
    EventLoop,
    /// Dispatch to a worker pool
    Pooled(Arc<Dispatcher>),
}

impl Executor {
    /// Build from options
    ///
    /// # Errors
    ///
    /// Returns `Dispatch` if the worker pool cannot be created.
    pub fn new(options: &ExecutorOptions) -> Result<Self> {
        match options.mode() {
            ExecutionMode::EventLoop => Ok(Self::EventLoop),
            ExecutionMode::Pooled => {
                let dispatcher = Dispatcher::builder()
                    .worker_threads(options.worker_threads)
                    .build()
                    .map_err(|e| BridgeError::Dispatch(format!("Failed to create dispatcher: {e}")))?;
                debug!("created dispatcher with {} worker threads", options.worker_threads());
                Ok(Self::Pooled(Arc::new(dispatcher)))
            }
        }
    }

    /// Execution mode of this executor
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        match self {
            Self::EventLoop => ExecutionMode::EventLoop,
            Self::Pooled(_) => ExecutionMode::Pooled,
        }
    }

    /// Run the operation built by `task` and report its outcome to `completion`
    ///
    /// Returns once the operation is scheduled.
    ///
    /// # Errors
    ///
    /// Returns `Dispatch` if the pool refused the task, or if the event-loop
    /// strategy is used from a thread without a compio runtime. `completion`
    /// is dropped without firing in that case.
    pub fn submit<F, Fut>(&self, op: &'static str, task: F, completion: CompletionAdapter) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<Value>> + 'static,
    {
        debug!("submitting {} ({:?})", op, self.mode());
        match self {
            Self::EventLoop => spawn_detached(run(op, task, completion))
                .map_err(|e| BridgeError::Dispatch(format!("Failed to spawn {op}: {e}"))),
            Self::Pooled(dispatcher) => {
                let _receiver = dispatcher
                    .dispatch(move || run(op, task, completion))
                    .map_err(|e| BridgeError::Dispatch(format!("Failed to dispatch {op}: {e:?}")))?;
                Ok(())
            }
        }
    }
}

async fn run<F, Fut>(op: &'static str, task: F, completion: CompletionAdapter)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = io::Result<Value>>,
{
    let outcome = task().await;
    if let Err(e) = completion.complete(outcome) {
        error!("{}: {}", op, e);
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventLoop => f.write_str("Executor::EventLoop"),
            Self::Pooled(_) => f.write_str("Executor::Pooled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ResultShape;
    use crate::foreign::{BridgeContext, ForeignContext, NativeFunction};
    use crate::stats::BridgeStats;
    use futures::channel::oneshot;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    fn completion_to_channel(
        context: &BridgeContext,
    ) -> (CompletionAdapter, oneshot::Receiver<(Value, ThreadId)>) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let f = NativeFunction::value("done", move |args| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send((args[0].clone(), thread::current().id()));
            }
            Ok(Value::Null)
        });
        let handle = context.handle(&f, "Test::op").unwrap();
        (CompletionAdapter::new(handle, ResultShape::Value), rx)
    }

    #[test]
    fn test_pooled_options_default_to_cpu_count() {
        let options = ExecutorOptions::pooled(0);
        assert_eq!(options.mode(), ExecutionMode::Pooled);
        assert_eq!(options.worker_threads(), num_cpus::get().max(1));
        assert_eq!(ExecutorOptions::pooled(3).worker_threads(), 3);
    }

    #[compio::test]
    async fn test_event_loop_delivers_on_loop_thread() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let (completion, rx) = completion_to_channel(&context);

        let executor = Executor::new(&ExecutorOptions::event_loop()).unwrap();
        executor
            .submit("test", || async { Ok::<_, io::Error>(Value::Int(42)) }, completion)
            .unwrap();

        let (value, thread_id) = rx.await.unwrap();
        assert_eq!(value, Value::Int(42));
        assert_eq!(thread_id, thread::current().id());
    }

    #[compio::test]
    async fn test_pooled_delivers_off_loop_thread() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let (completion, rx) = completion_to_channel(&context);

        let executor = Executor::new(&ExecutorOptions::pooled(2)).unwrap();
        executor
            .submit(
                "test",
                || async { Err::<Value, _>(io::Error::new(io::ErrorKind::NotFound, "missing")) },
                completion,
            )
            .unwrap();

        let (value, thread_id) = rx.await.unwrap();
        assert!(value.is_error());
        assert_ne!(thread_id, thread::current().id());
        assert_eq!(context.stats().host_failures(), 1);
    }

    #[test]
    fn test_event_loop_outside_runtime_is_dispatch_error() {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let (completion, _rx) = completion_to_channel(&context);

        let err = Executor::EventLoop
            .submit("test", || async { Ok::<_, io::Error>(Value::Null) }, completion)
            .unwrap_err();
        assert!(matches!(err, BridgeError::Dispatch(_)));
        assert_eq!(context.stats().completions_delivered(), 0);
    }
}
