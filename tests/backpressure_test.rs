//! Write-queue backpressure through the stream bridge
//!
//! A stream reports full once outstanding writes reach the high-water mark
//! and fires its drain handler exactly once per full episode.

mod common;

use callbridge::foreign::Value;
use callbridge::fs::{FileSystem, OpenOptions};
use callbridge::{BridgeError, Executor, WebSocket, WriteStream};
use common::{channel_callable, Bridge, Recorder};
use compio_host_io::{FrameKind, MemorySocket, SocketRegistry};
use futures::StreamExt;
use tempfile::TempDir;

fn one_byte() -> Value {
    Value::Bytes(vec![0x2a])
}

#[test]
fn test_queue_full_then_single_drain() {
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));
    let drains = Recorder::new();
    ws.drain_handler(Some(&drains.callable("drain"))).unwrap();
    ws.write_queue_max_size(2).unwrap();

    for _ in 0..3 {
        ws.write(one_byte()).unwrap();
    }
    assert!(ws.write_queue_full());

    // 3 -> 2 outstanding: still above the low-water mark
    assert_eq!(ws.host().take_written(1).len(), 1);
    assert_eq!(drains.count(), 0);

    // 2 -> 0 outstanding: the episode ends here
    let frames = ws.host().take_written(10);
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|frame| frame.kind == FrameKind::Binary));
    assert!(!ws.write_queue_full());
    assert_eq!(drains.firsts(), vec![Value::Null]);

    // Draining further without refilling reports nothing
    assert!(ws.host().take_written(10).is_empty());
    assert_eq!(drains.count(), 1);
}

#[test]
fn test_each_full_episode_drains_once() {
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));
    let drains = Recorder::new();
    ws.drain_handler(Some(&drains.callable("drain"))).unwrap();
    ws.write_queue_max_size(2).unwrap();

    for episode in 1..=3 {
        ws.write(one_byte()).unwrap();
        ws.write(one_byte()).unwrap();
        assert!(ws.write_queue_full());
        ws.host().take_written(2);
        assert_eq!(drains.count(), episode);
    }
}

#[test]
fn test_raising_queue_size_ends_episode() {
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));
    let drains = Recorder::new();
    ws.drain_handler(Some(&drains.callable("drain"))).unwrap();
    ws.write_queue_max_size(2).unwrap();

    ws.write(one_byte()).unwrap();
    ws.write(one_byte()).unwrap();
    assert!(ws.write_queue_full());

    ws.write_queue_max_size(100).unwrap();
    assert!(!ws.write_queue_full());
    assert_eq!(drains.count(), 1);
}

#[test]
fn test_zero_queue_size_on_idle_stream_does_not_drain() {
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));
    let drains = Recorder::new();
    ws.drain_handler(Some(&drains.callable("drain"))).unwrap();

    ws.write_queue_max_size(0).unwrap();
    assert!(ws.write_queue_full());
    assert_eq!(drains.count(), 0);

    ws.write(one_byte()).unwrap();
    ws.host().take_written(1);
    assert_eq!(drains.count(), 1);
}

#[test]
fn test_invalid_writes_are_rejected() {
    let bridge = Bridge::new();
    let ws = WebSocket::new(&bridge.context, MemorySocket::new(&SocketRegistry::new()));

    assert!(matches!(
        ws.write_queue_max_size(-5),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
        ws.write(Value::Int(3)),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert_eq!(ws.host().pending_written(), 0);
}

#[compio::test]
async fn test_file_writes_drain_then_flush() {
    let bridge = Bridge::new();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out.bin");

    let fs = FileSystem::new(&bridge.context, Executor::EventLoop);
    let file = fs.open_sync(&path, &OpenOptions::default()).unwrap();

    let (drain, mut drain_rx) = channel_callable("drain");
    file.drain_handler(Some(&drain)).unwrap();
    file.write_queue_max_size(8).unwrap();

    for chunk in [b"abcd", b"efgh", b"ijkl"] {
        file.write(Value::Bytes(chunk.to_vec())).unwrap();
    }
    assert!(file.write_queue_full());

    assert_eq!(drain_rx.next().await, Some(Value::Null));

    let (flushed, mut flushed_rx) = channel_callable("flush");
    file.flush(&flushed).unwrap();
    assert_eq!(flushed_rx.next().await, Some(Value::Null));

    assert!(!file.write_queue_full());
    assert_eq!(std::fs::read(&path).unwrap(), b"abcdefghijkl");
    assert!(drain_rx.try_next().is_err());
}
