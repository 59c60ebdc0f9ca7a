//! In-process socket with host-side buffering and write-queue backpressure
//!
//! `MemorySocket` plays the role of a connected message socket. The peer side
//! is driven with [`deliver`](MemorySocket::deliver),
//! [`finish`](MemorySocket::finish), [`fail`](MemorySocket::fail) and
//! [`take_written`](MemorySocket::take_written). Inbound events go through a
//! single ordered queue: while the socket is paused they stay there, and on
//! resume they are delivered in arrival order before anything newer.

use crate::queue::WriteQueue;
use crate::stream::{Handler, HandlerSlot, ReadSource, WriteSink};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Default high-water mark for socket writes
pub const DEFAULT_SOCKET_QUEUE_SIZE: usize = 64 * 1024;

/// Kind of a written frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Binary payload
    Binary,
    /// UTF-8 text payload
    Text,
}

/// A frame written to the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind
    pub kind: FrameKind,
    /// Payload bytes
    pub payload: Vec<u8>,
}

enum Inbound {
    Data(Vec<u8>),
    End,
    Error(io::Error),
}

struct SocketState {
    paused: bool,
    closed: bool,
    inbound: VecDeque<Inbound>,
    outbound: VecDeque<Frame>,
    queue: WriteQueue,
}

struct SocketInner {
    id: u64,
    state: Mutex<SocketState>,
    pumping: AtomicBool,
    data: HandlerSlot<Vec<u8>>,
    end: HandlerSlot<()>,
    exception: HandlerSlot<io::Error>,
    drain: HandlerSlot<()>,
    close: HandlerSlot<()>,
}

/// Registry resolving handler ids to live sockets
///
/// Sockets register their binary and text handler ids on creation; writing to
/// an id forwards to that socket as long as it is alive and open.
#[derive(Clone, Default)]
pub struct SocketRegistry {
    sockets: Arc<DashMap<String, (FrameKind, Weak<SocketInner>)>>,
    next_id: Arc<AtomicU64>,
}

impl SocketRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `payload` to the socket registered under `handler_id`
    ///
    /// Returns `false` if no live socket is registered under that id.
    pub fn send(&self, handler_id: &str, payload: Vec<u8>) -> bool {
        let Some(entry) = self.sockets.get(handler_id) else {
            return false;
        };
        let (kind, weak) = entry.value();
        let kind = *kind;
        let Some(inner) = weak.upgrade() else {
            drop(entry);
            self.sockets.remove(handler_id);
            return false;
        };
        drop(entry);
        MemorySocket { inner, registry: self.clone() }.write_frame(Frame { kind, payload });
        true
    }

    /// Number of registered handler ids
    #[must_use]
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    /// Whether no handler ids are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    fn register(&self, inner: &Arc<SocketInner>) {
        for kind in [FrameKind::Binary, FrameKind::Text] {
            self.sockets
                .insert(handler_id(inner.id, kind), (kind, Arc::downgrade(inner)));
        }
    }

    fn unregister(&self, id: u64) {
        for kind in [FrameKind::Binary, FrameKind::Text] {
            self.sockets.remove(&handler_id(id, kind));
        }
    }
}

fn handler_id(id: u64, kind: FrameKind) -> String {
    match kind {
        FrameKind::Binary => format!("memsock-{id}.binary"),
        FrameKind::Text => format!("memsock-{id}.text"),
    }
}

/// In-process message socket
#[derive(Clone)]
pub struct MemorySocket {
    inner: Arc<SocketInner>,
    registry: SocketRegistry,
}

impl MemorySocket {
    /// Create a socket and register its handler ids in `registry`
    #[must_use]
    pub fn new(registry: &SocketRegistry) -> Self {
        let id = registry.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = Arc::new(SocketInner {
            id,
            state: Mutex::new(SocketState {
                paused: false,
                closed: false,
                inbound: VecDeque::new(),
                outbound: VecDeque::new(),
                queue: WriteQueue::new(DEFAULT_SOCKET_QUEUE_SIZE),
            }),
            pumping: AtomicBool::new(false),
            data: HandlerSlot::new(),
            end: HandlerSlot::new(),
            exception: HandlerSlot::new(),
            drain: HandlerSlot::new(),
            close: HandlerSlot::new(),
        });
        registry.register(&inner);
        Self {
            inner,
            registry: registry.clone(),
        }
    }

    /// Numeric socket id, unique per registry
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Handler id accepting binary frames
    #[must_use]
    pub fn binary_handler_id(&self) -> String {
        handler_id(self.inner.id, FrameKind::Binary)
    }

    /// Handler id accepting text frames
    #[must_use]
    pub fn text_handler_id(&self) -> String {
        handler_id(self.inner.id, FrameKind::Text)
    }

    /// Write a binary frame
    pub fn write_binary_frame(&self, payload: Vec<u8>) {
        self.write_frame(Frame { kind: FrameKind::Binary, payload });
    }

    /// Write a text frame
    pub fn write_text_frame(&self, text: &str) {
        self.write_frame(Frame {
            kind: FrameKind::Text,
            payload: text.as_bytes().to_vec(),
        });
    }

    /// Set or clear the handler fired once when the socket closes
    pub fn set_close_handler(&self, handler: Option<Handler<()>>) {
        self.inner.close.set(handler);
    }

    /// Close the socket
    ///
    /// Pending inbound events are discarded, the close handler fires once and
    /// the handler ids are unregistered. Closing twice is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.inbound.clear();
        }
        self.registry.unregister(self.inner.id);
        log::debug!("memsock-{} closed", self.inner.id);
        self.inner.close.call(());
    }

    /// Whether the socket has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }

    /// Whether a data handler is currently attached
    #[must_use]
    pub fn has_data_handler(&self) -> bool {
        self.inner.data.is_set()
    }

    /// Whether a drain handler is currently attached
    #[must_use]
    pub fn has_drain_handler(&self) -> bool {
        self.inner.drain.is_set()
    }

    /// Whether inbound delivery is paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.lock_state().paused
    }

    // ========================================================================
    // PEER SIDE
    // ========================================================================

    /// Peer sent `payload`
    pub fn deliver(&self, payload: Vec<u8>) {
        self.inner.enqueue(Inbound::Data(payload));
    }

    /// Peer ended the stream
    pub fn finish(&self) {
        self.inner.enqueue(Inbound::End);
    }

    /// Transport reported an error
    pub fn fail(&self, error: io::Error) {
        self.inner.enqueue(Inbound::Error(error));
    }

    /// Peer consumed up to `max` written frames
    ///
    /// Completing writes may end a full episode, which fires the drain handler.
    pub fn take_written(&self, max: usize) -> Vec<Frame> {
        let (frames, drained) = {
            let mut state = self.inner.lock_state();
            let count = max.min(state.outbound.len());
            let frames: Vec<Frame> = state.outbound.drain(..count).collect();
            let mut drained = false;
            for frame in &frames {
                drained |= state.queue.complete(frame.payload.len());
            }
            (frames, drained)
        };
        if drained {
            self.inner.drain.call(());
        }
        frames
    }

    /// Frames written but not yet consumed by the peer
    #[must_use]
    pub fn pending_written(&self) -> usize {
        self.inner.lock_state().outbound.len()
    }

    fn write_frame(&self, frame: Frame) {
        {
            let mut state = self.inner.lock_state();
            if !state.closed {
                state.queue.push(frame.payload.len());
                state.outbound.push_back(frame);
                return;
            }
        }
        self.inner.exception.call(io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("write to closed memsock-{}", self.inner.id),
        ));
    }
}

impl SocketInner {
    fn lock_state(&self) -> MutexGuard<'_, SocketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, event: Inbound) {
        {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.inbound.push_back(event);
        }
        self.pump();
    }

    /// Deliver queued inbound events in order until empty or paused
    ///
    /// Only one thread pumps at a time. A caller that loses the race returns
    /// immediately; the active pump re-checks the queue after releasing its
    /// claim, so no event is stranded.
    fn pump(&self) {
        loop {
            if self
                .pumping
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            loop {
                let next = {
                    let mut state = self.lock_state();
                    if state.paused || state.closed {
                        None
                    } else {
                        state.inbound.pop_front()
                    }
                };
                match next {
                    Some(Inbound::Data(payload)) => {
                        self.data.call(payload);
                    }
                    Some(Inbound::End) => {
                        self.end.call(());
                    }
                    Some(Inbound::Error(error)) => {
                        if !self.exception.call(error) {
                            log::debug!("memsock-{}: error dropped, no exception handler", self.id);
                        }
                    }
                    None => break,
                }
            }

            self.pumping.store(false, Ordering::Release);
            let more = {
                let state = self.lock_state();
                !state.paused && !state.closed && !state.inbound.is_empty()
            };
            if !more {
                return;
            }
        }
    }
}

impl ReadSource for MemorySocket {
    type Item = Vec<u8>;

    fn set_data_handler(&self, handler: Option<Handler<Vec<u8>>>) {
        self.inner.data.set(handler);
    }

    fn set_end_handler(&self, handler: Option<Handler<()>>) {
        self.inner.end.set(handler);
    }

    fn set_exception_handler(&self, handler: Option<Handler<io::Error>>) {
        self.inner.exception.set(handler);
    }

    fn pause(&self) {
        self.inner.lock_state().paused = true;
    }

    fn resume(&self) {
        self.inner.lock_state().paused = false;
        self.inner.pump();
    }
}

impl WriteSink for MemorySocket {
    fn write(&self, data: Vec<u8>) {
        self.write_binary_frame(data);
    }

    fn set_write_queue_max_size(&self, max: usize) {
        let drained = self.inner.lock_state().queue.set_max_size(max);
        if drained {
            self.inner.drain.call(());
        }
    }

    fn is_write_queue_full(&self) -> bool {
        self.inner.lock_state().queue.is_full()
    }

    fn set_drain_handler(&self, handler: Option<Handler<()>>) {
        self.inner.drain.set(handler);
    }
}

impl std::fmt::Debug for MemorySocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySocket")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}
