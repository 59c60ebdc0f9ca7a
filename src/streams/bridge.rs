//! Generic bridge between a host stream and foreign handlers

use super::{ReadStream, WriteStream};
use crate::error::{BridgeError, Result};
use crate::events::{EventAdapter, EventSlot};
use crate::foreign::{BridgeContext, FromForeign, Value};
use compio_host_io::{Handler, ReadSource, WriteSink};
use std::io;
use std::sync::Arc;

/// Host stream wrapped with one event slot per handler
///
/// Dropping the bridge detaches every handler from the host.
pub struct Stream<S: ReadSource<Item = Vec<u8>> + WriteSink> {
    source: S,
    context: BridgeContext,
    data: EventSlot,
    end: EventSlot,
    exception: EventSlot,
    drain: EventSlot,
}

impl<S: ReadSource<Item = Vec<u8>> + WriteSink> Stream<S> {
    /// Wrap `source`; `name` prefixes the handler sites (e.g. `AsyncFile`)
    pub fn new(context: &BridgeContext, name: &str, source: S) -> Self {
        Self {
            source,
            context: context.clone(),
            data: EventSlot::new(context, format!("{name}::handler")),
            end: EventSlot::new(context, format!("{name}::endHandler")),
            exception: EventSlot::new(context, format!("{name}::exceptionHandler")),
            drain: EventSlot::new(context, format!("{name}::drainHandler")),
        }
    }

    /// The wrapped host stream
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Bridge context of the stream
    pub const fn context(&self) -> &BridgeContext {
        &self.context
    }
}

impl<S: ReadSource<Item = Vec<u8>> + WriteSink> Drop for Stream<S> {
    fn drop(&mut self) {
        self.source.set_data_handler(None);
        self.source.set_end_handler(None);
        self.source.set_exception_handler(None);
        self.source.set_drain_handler(None);
        self.data.clear();
        self.end.clear();
        self.exception.clear();
        self.drain.clear();
    }
}

/// A facade object built on a [`Stream`]
///
/// Implementing this gives the facade [`ReadStream`] and [`WriteStream`].
pub trait StreamFacade {
    /// Host stream type
    type Source: ReadSource<Item = Vec<u8>> + WriteSink;

    /// The facade's stream bridge
    fn stream(&self) -> &Stream<Self::Source>;
}

impl<S: ReadSource<Item = Vec<u8>> + WriteSink> StreamFacade for Stream<S> {
    type Source = S;

    fn stream(&self) -> &Self {
        self
    }
}

fn unit_handler(adapter: Option<EventAdapter>) -> Option<Handler<()>> {
    adapter.map(|adapter| -> Handler<()> {
        Arc::new(move |()| {
            adapter.fire(&[Value::Null]);
        })
    })
}

impl<T: StreamFacade> ReadStream for T {
    fn data_handler(&self, handler: Option<&Value>) -> Result<()> {
        let stream = self.stream();
        let adapter = stream.data.register(handler)?;
        stream
            .source
            .set_data_handler(adapter.map(|adapter| -> Handler<Vec<u8>> {
                Arc::new(move |chunk: Vec<u8>| {
                    adapter.fire(&[Value::Bytes(chunk)]);
                })
            }));
        Ok(())
    }

    fn end_handler(&self, handler: Option<&Value>) -> Result<()> {
        let stream = self.stream();
        let adapter = stream.end.register(handler)?;
        stream.source.set_end_handler(unit_handler(adapter));
        Ok(())
    }

    fn exception_handler(&self, handler: Option<&Value>) -> Result<()> {
        let stream = self.stream();
        let adapter = stream.exception.register(handler)?;
        stream
            .source
            .set_exception_handler(adapter.map(|adapter| -> Handler<io::Error> {
                Arc::new(move |error: io::Error| {
                    adapter.fire(&[Value::from_io_error(&error)]);
                })
            }));
        Ok(())
    }

    fn pause(&self) {
        self.stream().source.pause();
    }

    fn resume(&self) {
        self.stream().source.resume();
    }
}

impl<T: StreamFacade> WriteStream for T {
    fn write(&self, data: Value) -> Result<()> {
        let bytes = Vec::<u8>::from_foreign(data)?;
        self.stream().source.write(bytes);
        Ok(())
    }

    fn write_queue_max_size(&self, max: i64) -> Result<()> {
        let max = usize::try_from(max).map_err(|_| {
            BridgeError::invalid_argument(format!("write queue max size must be >= 0, got {max}"))
        })?;
        self.stream().source.set_write_queue_max_size(max);
        Ok(())
    }

    fn write_queue_full(&self) -> bool {
        self.stream().source.is_write_queue_full()
    }

    fn drain_handler(&self, handler: Option<&Value>) -> Result<()> {
        let stream = self.stream();
        let adapter = stream.drain.register(handler)?;
        stream.source.set_drain_handler(unit_handler(adapter));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::{ForeignContext, NativeFunction};
    use crate::stats::BridgeStats;
    use compio_host_io::{MemorySocket, SocketRegistry};
    use std::sync::Mutex;

    fn setup() -> (Arc<ForeignContext>, BridgeContext, MemorySocket) {
        let foreign = ForeignContext::new("test");
        let context = BridgeContext::new(&foreign, Arc::new(BridgeStats::new()));
        let socket = MemorySocket::new(&SocketRegistry::new());
        (foreign, context, socket)
    }

    #[test]
    fn test_negative_queue_size_rejected() {
        let (_foreign, context, socket) = setup();
        let stream = Stream::new(&context, "Test", socket);
        let err = stream.write_queue_max_size(-1).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        assert!(stream.write_queue_max_size(0).is_ok());
    }

    #[test]
    fn test_not_callable_attaches_nothing() {
        let (_foreign, context, socket) = setup();
        let stream = Stream::new(&context, "Test", socket.clone());
        let err = stream.data_handler(Some(&Value::Str("nope".into()))).unwrap_err();
        assert!(matches!(err, BridgeError::NotCallable { ref site, .. } if site == "Test::handler"));
        assert!(!socket.has_data_handler());
    }

    #[test]
    fn test_write_rejects_non_bytes() {
        let (_foreign, context, socket) = setup();
        let stream = Stream::new(&context, "Test", socket.clone());
        assert!(stream.write(Value::Int(4)).is_err());
        stream.write(Value::Str("ok".into())).unwrap();
        assert_eq!(socket.take_written(1)[0].payload, b"ok");
    }

    #[test]
    fn test_drop_detaches_host_handlers() {
        let (_foreign, context, socket) = setup();
        let stream = Stream::new(&context, "Test", socket.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let f = NativeFunction::value("data", move |args| {
            sink.lock().unwrap().push(args[0].clone());
            Ok(Value::Null)
        });
        stream.data_handler(Some(&f)).unwrap();
        socket.deliver(b"one".to_vec());
        drop(stream);
        socket.deliver(b"two".to_vec());

        assert!(!socket.has_data_handler());
        assert_eq!(*seen.lock().unwrap(), vec![Value::Bytes(b"one".to_vec())]);
    }

    #[test]
    fn test_exception_without_handler_is_dropped() {
        let (_foreign, context, socket) = setup();
        let _stream = Stream::new(&context, "Test", socket.clone());
        socket.fail(io::Error::other("reset"));
        assert_eq!(context.stats().events_delivered(), 0);
    }
}
