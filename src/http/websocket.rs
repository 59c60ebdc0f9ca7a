//! `WebSocket` facade over a host socket

use crate::error::{BridgeError, Result};
use crate::events::EventSlot;
use crate::foreign::{BridgeContext, ForeignObject, FromForeign, IntoForeign, Value};
use crate::streams::{Stream, StreamFacade};
use compio_host_io::{Handler, MemorySocket};
use std::fmt;
use std::sync::Arc;

/// Foreign type name of [`WebSocket`]
pub const TYPE_NAME: &str = "WebSocket";

/// A connected socket exposed to the foreign side
///
/// Implements [`ReadStream`](crate::streams::ReadStream) and
/// [`WriteStream`](crate::streams::WriteStream); plain `write` sends a binary
/// frame. Frames arriving while paused are buffered by the host socket and
/// delivered in order after `resume`.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<SocketFacade>,
}

struct SocketFacade {
    stream: Stream<MemorySocket>,
    close: EventSlot,
}

impl WebSocket {
    /// Wrap a host socket
    #[must_use]
    pub fn new(context: &BridgeContext, socket: MemorySocket) -> Self {
        Self {
            inner: Arc::new(SocketFacade {
                stream: Stream::new(context, TYPE_NAME, socket),
                close: EventSlot::new(context, format!("{TYPE_NAME}::closeHandler")),
            }),
        }
    }

    /// Recover the facade from a foreign value
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `value` is not a `WebSocket` object.
    pub fn from_value(value: &Value) -> Result<&Self> {
        let found = match value {
            Value::Object(object) => object.downcast_ref::<Self>(),
            _ => None,
        };
        found.ok_or_else(|| {
            BridgeError::invalid_argument(format!(
                "expected {TYPE_NAME}, found {}",
                value.type_name()
            ))
        })
    }

    /// The host socket
    #[must_use]
    pub fn host(&self) -> &MemorySocket {
        self.inner.stream.source()
    }

    /// Send `data` (`Bytes` or `Str`) as one binary frame
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `data` is neither bytes nor a string.
    pub fn write_binary_frame(&self, data: Value) -> Result<()> {
        self.host().write_binary_frame(Vec::<u8>::from_foreign(data)?);
        Ok(())
    }

    /// Send `text` as one text frame
    pub fn write_text_frame(&self, text: &str) {
        self.host().write_text_frame(text);
    }

    /// Id under which other code can send binary frames to this socket
    #[must_use]
    pub fn binary_handler_id(&self) -> String {
        self.host().binary_handler_id()
    }

    /// Id under which other code can send text frames to this socket
    #[must_use]
    pub fn text_handler_id(&self) -> String {
        self.host().text_handler_id()
    }

    /// Set the handler fired with `Null` once the socket closes
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable.
    pub fn close_handler(&self, handler: Option<&Value>) -> Result<()> {
        let adapter = self.inner.close.register(handler)?;
        self.host().set_close_handler(adapter.map(|adapter| -> Handler<()> {
            Arc::new(move |()| {
                adapter.fire(&[Value::Null]);
            })
        }));
        Ok(())
    }

    /// Close the socket; no further events are delivered afterwards
    pub fn close(&self) {
        self.host().close();
    }
}

impl StreamFacade for WebSocket {
    type Source = MemorySocket;

    fn stream(&self) -> &Stream<MemorySocket> {
        &self.inner.stream
    }
}

impl Drop for SocketFacade {
    fn drop(&mut self) {
        self.stream.source().set_close_handler(None);
        self.close.clear();
    }
}

impl IntoForeign for WebSocket {
    fn into_foreign(self) -> Value {
        Value::Object(ForeignObject::new(TYPE_NAME, self))
    }
}

impl fmt::Display for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TYPE_NAME}[memsock-{}]", self.host().id())
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("id", &self.host().id())
            .finish_non_exhaustive()
    }
}
