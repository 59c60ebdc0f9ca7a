//! Shared helpers for integration tests: a live foreign context plus
//! callables that record what they receive.

use callbridge::foreign::{BridgeContext, ForeignContext, ForeignException, NativeFunction, Value};
use callbridge::BridgeStats;
use futures::channel::mpsc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A foreign context kept alive for the duration of a test
#[allow(dead_code)]
pub struct Bridge {
    pub foreign: Arc<ForeignContext>,
    pub context: BridgeContext,
}

#[allow(dead_code)]
impl Bridge {
    pub fn new() -> Self {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        Self { foreign, context }
    }

    pub fn stats(&self) -> &BridgeStats {
        self.context.stats()
    }
}

/// Records every argument list it is called with
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Vec<Value>>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A foreign callable feeding this recorder
    pub fn callable(&self, name: &str) -> Value {
        let calls = Arc::clone(&self.calls);
        NativeFunction::value(name, move |args| {
            calls.lock().unwrap().push(args.to_vec());
            Ok(Value::Null)
        })
    }

    /// A foreign callable that records and then raises
    pub fn raising(&self, name: &str) -> Value {
        let calls = Arc::clone(&self.calls);
        NativeFunction::value(name, move |args| {
            calls.lock().unwrap().push(args.to_vec());
            Err(ForeignException::new("Error", "raised by test handler"))
        })
    }

    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().unwrap().clone()
    }

    /// First argument of every call
    pub fn firsts(&self) -> Vec<Value> {
        self.calls().into_iter().map(|mut args| args.remove(0)).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// A foreign callable that forwards its first argument to a channel
#[allow(dead_code)]
pub fn channel_callable(name: &str) -> (Value, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded();
    let callable = NativeFunction::value(name, move |args| {
        // The test may have stopped listening; that is not the handler's problem
        let _ = tx.unbounded_send(args.first().cloned().unwrap_or(Value::Null));
        Ok(Value::Null)
    });
    (callable, rx)
}

#[allow(dead_code)]
pub struct TestTimeoutGuard {
    cancelled: Arc<AtomicBool>,
}

impl Drop for TestTimeoutGuard {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Abort the test process if the guard is still alive after `duration`
#[allow(dead_code)]
pub fn test_timeout_guard(duration: Duration) -> TestTimeoutGuard {
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = Arc::clone(&cancelled);
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        if !cancelled_clone.load(Ordering::SeqCst) {
            eprintln!("Test timeout exceeded ({}s). Aborting.", duration.as_secs());
            std::process::abort();
        }
    });
    TestTimeoutGuard { cancelled }
}
