//! The foreign entry gate is released on every exit path
//!
//! A handler that raises or panics must not leave the context locked: the
//! next delivery from any thread proceeds.

mod common;

use callbridge::foreign::{ForeignException, NativeFunction, Value};
use callbridge::{BridgeError, CallableHandle, CompletionAdapter, ReadStream, ResultShape, WebSocket};
use common::{test_timeout_guard, Bridge, Recorder};
use compio_host_io::{MemorySocket, SocketRegistry};
use rstest::rstest;
use std::thread;
use std::time::Duration;

fn panicking(name: &str) -> Value {
    NativeFunction::value(name, |_| panic!("handler blew up"))
}

fn raising(name: &str) -> Value {
    NativeFunction::value(name, |_| Err(ForeignException::new("TypeError", "bad handler")))
}

#[rstest]
#[case::raises(raising("raises"), "TypeError")]
#[case::panics(panicking("panics"), "panic")]
fn test_gate_released_after_failed_invoke(#[case] handler: Value, #[case] kind: &str) {
    let _guard = test_timeout_guard(Duration::from_secs(30));
    let bridge = Bridge::new();
    let handle = CallableHandle::new(&bridge.context, &handler, "Test::handler").unwrap();

    match handle.invoke(&[Value::Null]) {
        Err(BridgeError::Foreign(exception)) => assert_eq!(exception.kind, kind),
        other => panic!("expected a foreign exception, got {other:?}"),
    }
    assert!(!bridge.foreign.gate().is_held());
    assert!(!bridge.foreign.gate().is_held_by_current_thread());

    // Another thread can enter right away
    let foreign = std::sync::Arc::clone(&bridge.foreign);
    let entered = thread::spawn(move || foreign.enter(|| true)).join().unwrap();
    assert!(entered);
}

#[test]
fn test_completion_absorbs_panicking_handler() {
    let _guard = test_timeout_guard(Duration::from_secs(30));
    let bridge = Bridge::new();
    let handle = CallableHandle::new(&bridge.context, &panicking("done"), "Test::done").unwrap();
    let completion = CompletionAdapter::new(handle, ResultShape::Value);

    assert!(completion.on_success(Value::Int(1)).is_ok());
    assert!(completion.has_fired());
    assert_eq!(bridge.stats().foreign_exceptions(), 1);
    assert!(!bridge.foreign.gate().is_held());
}

#[test]
fn test_stream_keeps_delivering_after_handler_panics() {
    let _guard = test_timeout_guard(Duration::from_secs(30));
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));
    ws.data_handler(Some(&panicking("data"))).unwrap();

    // Delivery from a foreign-less host thread
    let socket = ws.host().clone();
    thread::spawn(move || socket.deliver(b"first".to_vec()))
        .join()
        .unwrap();
    assert_eq!(bridge.stats().foreign_exceptions(), 1);

    let recorder = Recorder::new();
    ws.data_handler(Some(&recorder.callable("data"))).unwrap();
    ws.host().deliver(b"second".to_vec());
    assert_eq!(recorder.firsts(), vec![Value::Bytes(b"second".to_vec())]);
}
