//! Handler replacement racing host delivery
//!
//! Once a re-registration returns, the superseded handler must never run
//! again, even when the host thread already holds the old adapter.

mod common;

use callbridge::foreign::{NativeFunction, Value};
use callbridge::{ReadStream, WebSocket};
use common::{test_timeout_guard, Bridge};
use compio_host_io::{MemorySocket, SocketRegistry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_replaced_handler_never_fires_after_replacement() {
    let _guard = test_timeout_guard(Duration::from_secs(60));

    for _round in 0..20 {
        let bridge = Bridge::new();
        let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));

        let replaced = Arc::new(AtomicBool::new(false));
        let late_old_calls = Arc::new(AtomicUsize::new(0));
        let old_calls = Arc::new(AtomicUsize::new(0));
        let new_calls = Arc::new(AtomicUsize::new(0));

        let old = {
            let replaced = Arc::clone(&replaced);
            let late = Arc::clone(&late_old_calls);
            let calls = Arc::clone(&old_calls);
            NativeFunction::value("old", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if replaced.load(Ordering::SeqCst) {
                    late.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Value::Null)
            })
        };
        let new = {
            let calls = Arc::clone(&new_calls);
            NativeFunction::value("new", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
        };
        ws.data_handler(Some(&old)).unwrap();

        let delivering = Arc::new(AtomicBool::new(true));
        let producer = {
            let socket = ws.host().clone();
            let delivering = Arc::clone(&delivering);
            thread::spawn(move || {
                let mut sent = 0usize;
                while delivering.load(Ordering::SeqCst) {
                    socket.deliver(vec![0]);
                    sent += 1;
                }
                // A few more after replacement
                for _ in 0..100 {
                    socket.deliver(vec![1]);
                    sent += 1;
                }
                sent
            })
        };

        while old_calls.load(Ordering::SeqCst) < 10 {
            thread::yield_now();
        }
        ws.data_handler(Some(&new)).unwrap();
        replaced.store(true, Ordering::SeqCst);
        delivering.store(false, Ordering::SeqCst);

        let sent = producer.join().unwrap();
        assert_eq!(late_old_calls.load(Ordering::SeqCst), 0);
        assert!(new_calls.load(Ordering::SeqCst) >= 100);

        // Every event went to exactly one handler or was suppressed as stale
        let delivered = old_calls.load(Ordering::SeqCst) + new_calls.load(Ordering::SeqCst);
        let stale = usize::try_from(bridge.stats().stale_events()).unwrap();
        assert_eq!(delivered + stale, sent);
    }
}

#[test]
fn test_clearing_handler_stops_delivery() {
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = NativeFunction::value("data", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });

    ws.data_handler(Some(&handler)).unwrap();
    ws.host().deliver(vec![1]);
    ws.data_handler(None).unwrap();
    ws.host().deliver(vec![2]);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!ws.host().has_data_handler());
}
