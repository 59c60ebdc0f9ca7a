//! Stream over an open file
//!
//! `AsyncFile` reads and writes through positional I/O (`pread`/`pwrite`) on
//! compio's blocking pool, so any number of writes can be in flight at once:
//! each write reserves its offset at `write` time and completes independently.
//! Reading starts when the first data handler is attached and is driven by a
//! task on the current compio runtime. Starting the read side or a write from
//! a thread without a runtime reports an error on the exception handler.

use crate::fs::{blocking, spawn_detached};
use crate::props::parse_perms;
use crate::queue::WriteQueue;
use crate::stream::{Handler, HandlerSlot, ReadSource, WriteSink};
use futures::task::AtomicWaker;
use std::fs;
use std::future::poll_fn;
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;

/// Default read chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// How to open a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFlags {
    /// Permissions applied if the file is created
    pub perms: Option<String>,
    /// Open for reading
    pub read: bool,
    /// Open for writing
    pub write: bool,
    /// Create the file if missing
    pub create: bool,
    /// Fail if the file exists
    pub create_new: bool,
    /// Sync data to storage after every write
    pub flush: bool,
    /// Read chunk size for the data handler
    pub chunk_size: usize,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            perms: None,
            read: true,
            write: true,
            create: true,
            create_new: false,
            flush: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// An open file exposed as a readable and writable host stream
#[derive(Clone)]
pub struct AsyncFile {
    inner: Arc<FileInner>,
}

struct FileInner {
    file: Arc<fs::File>,
    path: PathBuf,
    chunk_size: usize,
    flush: bool,
    read_pos: AtomicU64,
    write_pos: AtomicU64,
    paused: AtomicBool,
    reading: AtomicBool,
    closed: AtomicBool,
    resume_waker: AtomicWaker,
    queue: Mutex<WriteQueue>,
    data: HandlerSlot<Vec<u8>>,
    end: HandlerSlot<()>,
    exception: HandlerSlot<io::Error>,
    drain: HandlerSlot<()>,
}

impl AsyncFile {
    /// Open `path` on the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error if `flags.perms` is invalid or the open fails.
    pub fn open_blocking(path: &Path, flags: &OpenFlags) -> io::Result<Self> {
        let mut options = fs::OpenOptions::new();
        options
            .read(flags.read)
            .write(flags.write)
            .create(flags.create && flags.write)
            .create_new(flags.create_new);
        if let Some(perms) = &flags.perms {
            options.mode(parse_perms(perms)?);
        }
        let file = options.open(path)?;
        log::debug!("opened {} (read={}, write={})", path.display(), flags.read, flags.write);
        Ok(Self::from_std(file, path.to_path_buf(), flags))
    }

    fn from_std(file: fs::File, path: PathBuf, flags: &OpenFlags) -> Self {
        Self {
            inner: Arc::new(FileInner {
                file: Arc::new(file),
                path,
                chunk_size: flags.chunk_size.max(1),
                flush: flags.flush,
                read_pos: AtomicU64::new(0),
                write_pos: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                reading: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                resume_waker: AtomicWaker::new(),
                queue: Mutex::new(WriteQueue::default()),
                data: HandlerSlot::new(),
                end: HandlerSlot::new(),
                exception: HandlerSlot::new(),
                drain: HandlerSlot::new(),
            }),
        }
    }

    /// Path the file was opened with
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Wait for every queued write, then sync the file to storage
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails.
    pub async fn flush(&self) -> io::Result<()> {
        self.writes_settled().await;
        let file = Arc::clone(&self.inner.file);
        blocking(move || file.sync_all()).await
    }

    /// Stop reading, wait for queued writes and release the handlers
    ///
    /// Deliveries already in progress run to completion; no new events are
    /// delivered once this is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub async fn close(&self) -> io::Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.resume_waker.wake();
        self.writes_settled().await;

        self.inner.data.set(None);
        self.inner.end.set(None);
        self.inner.exception.set(None);
        self.inner.drain.set(None);

        let file = Arc::clone(&self.inner.file);
        blocking(move || file.sync_data()).await?;
        log::debug!("closed {}", self.inner.path.display());
        Ok(())
    }

    async fn writes_settled(&self) {
        let empty = self.inner.lock_queue().when_empty();
        // A dropped sender only happens if the queue itself is gone
        let _ = empty.await;
    }

    fn start_reading(&self) {
        if self.inner.reading.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        if let Err(e) = spawn_detached(async move { inner.read_loop().await }) {
            self.inner.reading.store(false, Ordering::Release);
            log::warn!("cannot read {}: {e}", self.inner.path.display());
            self.inner.exception.call(e);
        }
    }
}

impl FileInner {
    fn lock_queue(&self) -> std::sync::MutexGuard<'_, WriteQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_resumed(&self) {
        poll_fn(|cx| {
            self.resume_waker.register(cx.waker());
            if self.paused.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire) {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;
    }

    async fn read_loop(self: Arc<Self>) {
        loop {
            self.wait_resumed().await;
            if self.closed.load(Ordering::Acquire) {
                break;
            }

            let file = Arc::clone(&self.file);
            let offset = self.read_pos.load(Ordering::Acquire);
            let chunk_size = self.chunk_size;
            let chunk = blocking(move || {
                let mut buf = vec![0u8; chunk_size];
                let n = file.read_at(&mut buf, offset)?;
                buf.truncate(n);
                Ok(buf)
            })
            .await;

            // pause() may have landed while the read was in flight
            self.wait_resumed().await;
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            match chunk {
                Ok(chunk) if chunk.is_empty() => {
                    self.end.call(());
                    break;
                }
                Ok(chunk) => {
                    self.read_pos.fetch_add(chunk.len() as u64, Ordering::AcqRel);
                    self.data.call(chunk);
                }
                Err(e) => {
                    log::warn!("read from {} failed: {e}", self.path.display());
                    self.exception.call(e);
                    break;
                }
            }
        }
        self.reading.store(false, Ordering::Release);
    }

    fn write_completed(&self, len: usize, result: io::Result<()>) {
        let drained = self.lock_queue().complete(len);
        if let Err(e) = result {
            log::warn!("write to {} failed: {e}", self.path.display());
            self.exception.call(e);
        }
        if drained && !self.closed.load(Ordering::Acquire) {
            self.drain.call(());
        }
    }
}

impl ReadSource for AsyncFile {
    type Item = Vec<u8>;

    fn set_data_handler(&self, handler: Option<Handler<Vec<u8>>>) {
        let attach = handler.is_some();
        self.inner.data.set(handler);
        if attach && !self.is_closed() {
            self.start_reading();
        }
    }

    fn set_end_handler(&self, handler: Option<Handler<()>>) {
        self.inner.end.set(handler);
    }

    fn set_exception_handler(&self, handler: Option<Handler<io::Error>>) {
        self.inner.exception.set(handler);
    }

    fn pause(&self) {
        self.inner.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.inner.paused.store(false, Ordering::Release);
        self.inner.resume_waker.wake();
    }
}

impl WriteSink for AsyncFile {
    fn write(&self, data: Vec<u8>) {
        if self.is_closed() {
            self.inner.exception.call(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("write to closed file {}", self.inner.path.display()),
            ));
            return;
        }

        let len = data.len();
        let offset = self.inner.write_pos.fetch_add(len as u64, Ordering::AcqRel);
        self.inner.lock_queue().push(len);

        let inner = Arc::clone(&self.inner);
        let spawned = spawn_detached(async move {
            let file = Arc::clone(&inner.file);
            let flush = inner.flush;
            let result = blocking(move || {
                file.write_all_at(&data, offset)?;
                if flush {
                    file.sync_data()?;
                }
                Ok(())
            })
            .await;
            inner.write_completed(len, result);
        });
        if let Err(e) = spawned {
            self.inner.write_pos.fetch_sub(len as u64, Ordering::AcqRel);
            self.inner.write_completed(len, Err(e));
        }
    }

    fn set_write_queue_max_size(&self, max: usize) {
        let drained = self.inner.lock_queue().set_max_size(max);
        if drained {
            self.inner.drain.call(());
        }
    }

    fn is_write_queue_full(&self) -> bool {
        self.inner.lock_queue().is_full()
    }

    fn set_drain_handler(&self, handler: Option<Handler<()>>) {
        self.inner.drain.set(handler);
    }
}

impl std::fmt::Debug for AsyncFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFile")
            .field("path", &self.inner.path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
