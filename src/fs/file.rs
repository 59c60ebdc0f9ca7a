//! `AsyncFile` facade: an open file as a flow-controlled foreign stream

use crate::completion::{CompletionAdapter, ResultShape};
use crate::error::{BridgeError, Result};
use crate::executor::Executor;
use crate::foreign::{BridgeContext, ForeignObject, IntoForeign, Value};
use crate::streams::{Stream, StreamFacade};
use compio_host_io::AsyncFile as HostFile;
use compio_host_io::WriteSink;
use std::sync::Arc;

/// Foreign type name of [`AsyncFile`]
pub const TYPE_NAME: &str = "AsyncFile";

/// An open file exposed to the foreign side
///
/// Implements [`ReadStream`](crate::streams::ReadStream) and
/// [`WriteStream`](crate::streams::WriteStream). Reading starts when a data
/// handler is first attached.
#[derive(Clone)]
pub struct AsyncFile {
    inner: Arc<FileFacade>,
}

struct FileFacade {
    stream: Stream<HostFile>,
    executor: Executor,
}

impl AsyncFile {
    /// Wrap an open host file
    #[must_use]
    pub fn new(context: &BridgeContext, executor: Executor, file: HostFile) -> Self {
        Self {
            inner: Arc::new(FileFacade {
                stream: Stream::new(context, TYPE_NAME, file),
                executor,
            }),
        }
    }

    /// Recover the facade from a foreign value produced by `FileSystem::open`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `value` is not an `AsyncFile` object.
    pub fn from_value(value: &Value) -> Result<&Self> {
        match value {
            Value::Object(object) => object.downcast_ref::<Self>().ok_or_else(|| {
                BridgeError::invalid_argument(format!(
                    "expected {TYPE_NAME}, found {}",
                    object.type_name()
                ))
            }),
            other => Err(BridgeError::invalid_argument(format!(
                "expected {TYPE_NAME}, found {}",
                other.type_name()
            ))),
        }
    }

    /// The host file
    #[must_use]
    pub fn host(&self) -> &HostFile {
        self.inner.stream.source()
    }

    /// Set the initial write-queue high-water mark
    pub(crate) fn with_write_queue_max_size(self, max: usize) -> Self {
        self.host().set_write_queue_max_size(max);
        self
    }

    /// Close the file; `handler` receives `Null` once every queued write has
    /// reached the file, or an error value
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable, or `Dispatch` if
    /// the executor refused the task.
    pub fn close(&self, handler: &Value) -> Result<()> {
        let completion = self.completion("AsyncFile::close", handler)?;
        let file = self.host().clone();
        self.inner.executor.submit(
            "close",
            move || async move { file.close().await.map(IntoForeign::into_foreign) },
            completion,
        )
    }

    /// Flush queued writes and sync the file to storage; `handler` receives
    /// `Null` or an error value
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `handler` is not callable, or `Dispatch` if
    /// the executor refused the task.
    pub fn flush(&self, handler: &Value) -> Result<()> {
        let completion = self.completion("AsyncFile::flush", handler)?;
        let file = self.host().clone();
        self.inner.executor.submit(
            "flush",
            move || async move { file.flush().await.map(IntoForeign::into_foreign) },
            completion,
        )
    }

    fn completion(&self, site: &str, handler: &Value) -> Result<CompletionAdapter> {
        let handle = self.inner.stream.context().handle(handler, site)?;
        Ok(CompletionAdapter::new(handle, ResultShape::Void))
    }
}

impl StreamFacade for AsyncFile {
    type Source = HostFile;

    fn stream(&self) -> &Stream<HostFile> {
        &self.inner.stream
    }
}

impl IntoForeign for AsyncFile {
    fn into_foreign(self) -> Value {
        Value::Object(ForeignObject::new(TYPE_NAME, self))
    }
}

impl std::fmt::Debug for AsyncFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFile")
            .field("path", &self.host().path())
            .finish_non_exhaustive()
    }
}
