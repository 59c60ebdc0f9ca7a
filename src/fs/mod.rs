//! `FileSystem` facade
//!
//! Every operation comes in two forms:
//! - `op(.., handler)`: validates `handler`, submits the host operation to the
//!   executor and returns at once. The handler later receives exactly one
//!   argument: `Null` for void operations, the result value, or a
//!   `Value::Error` describing the host failure.
//! - `op_sync(..)`: runs the same host operation on the calling thread and
//!   returns its result; host failures become `BridgeError::Host`.
//!
//! | Operation      | Async result                      | Sync result        |
//! |----------------|-----------------------------------|--------------------|
//! | `exists`       | `Bool`                            | `bool`             |
//! | `props`        | `Map` of file properties          | `FileProps`        |
//! | `lprops`       | `Map`, symlinks not followed      | `FileProps`        |
//! | `fs_props`     | `Map` of capacities               | `FileSystemProps`  |
//! | `read_dir`     | `List` of full paths              | `Vec<String>`      |
//! | `read_file`    | `Bytes`                           | `Vec<u8>`          |
//! | `read_symlink` | `Str`                             | `String`           |
//! | `open`         | `Object` (`AsyncFile`)            | `AsyncFile`        |
//! | all others     | `Null`                            | `()`               |

pub mod file;
pub mod options;

pub use file::AsyncFile;
pub use options::{
    ChmodOptions, CopyOptions, CreateFileOptions, DeleteOptions, MkdirOptions, OpenOptions,
    ReadDirOptions,
};

use crate::completion::{CompletionAdapter, ResultShape};
use crate::error::{BridgeError, Result};
use crate::executor::Executor;
use crate::foreign::{BridgeContext, FromForeign, IntoForeign, Value};
use crate::streams::StreamOptions;
use compio_host_io::{FileProps, FileSystemProps, LocalFileSystem};
use options::check_perms;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// File-system operations for foreign callers
#[derive(Debug, Clone)]
pub struct FileSystem {
    context: BridgeContext,
    executor: Executor,
    stream_options: StreamOptions,
}

impl FileSystem {
    /// Create the facade; async operations run on `executor`
    #[must_use]
    pub fn new(context: &BridgeContext, executor: Executor) -> Self {
        Self {
            context: context.clone(),
            executor,
            stream_options: StreamOptions::default(),
        }
    }

    /// Use `options` for files opened through this facade
    #[must_use]
    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    /// Executor the async forms run on
    #[must_use]
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    // ========================================================================
    // PERMISSIONS
    // ========================================================================

    /// Change permissions of `path` (recursively with `dir_perms`)
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch` if the
    /// executor refused the task.
    pub fn chmod(
        &self,
        path: impl AsRef<Path>,
        perms: &str,
        options: &ChmodOptions,
        handler: &Value,
    ) -> Result<()> {
        let completion = self.completion("FileSystem::chmod", ResultShape::Void, handler)?;
        let path = owned(path);
        let perms = perms.to_owned();
        let dir_perms = options.dir_perms.clone();
        self.submit("chmod", completion, move || async move {
            LocalFileSystem::new()
                .chmod(&path, &perms, dir_perms.as_deref())
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`chmod`](Self::chmod)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed permission string, or `Host`.
    pub fn chmod_sync(&self, path: impl AsRef<Path>, perms: &str, options: &ChmodOptions) -> Result<()> {
        check_perms(Some(perms))?;
        check_perms(options.dir_perms.as_deref())?;
        Ok(LocalFileSystem::chmod_blocking(
            path.as_ref(),
            perms,
            options.dir_perms.as_deref(),
        )?)
    }

    // ========================================================================
    // COPY / MOVE / DELETE
    // ========================================================================

    /// Copy `from` to `to`; the destination must not exist
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn copy(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        options: &CopyOptions,
        handler: &Value,
    ) -> Result<()> {
        let completion = self.completion("FileSystem::copy", ResultShape::Void, handler)?;
        let (from, to) = (owned(from), owned(to));
        let recursive = options.recursive;
        self.submit("copy", completion, move || async move {
            LocalFileSystem::new()
                .copy(&from, &to, recursive)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`copy`](Self::copy)
    ///
    /// # Errors
    ///
    /// Returns `Host` if the copy fails.
    pub fn copy_sync(&self, from: impl AsRef<Path>, to: impl AsRef<Path>, options: &CopyOptions) -> Result<()> {
        Ok(LocalFileSystem::copy_blocking(
            from.as_ref(),
            to.as_ref(),
            options.recursive,
        )?)
    }

    /// Move `from` to `to`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn move_path(&self, from: impl AsRef<Path>, to: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::move", ResultShape::Void, handler)?;
        let (from, to) = (owned(from), owned(to));
        self.submit("move", completion, move || async move {
            LocalFileSystem::new()
                .rename(&from, &to)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`move_path`](Self::move_path)
    ///
    /// # Errors
    ///
    /// Returns `Host` if the move fails.
    pub fn move_path_sync(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        Ok(LocalFileSystem::rename_blocking(from.as_ref(), to.as_ref())?)
    }

    /// Delete `path` (a directory only if empty, unless recursive)
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn delete(&self, path: impl AsRef<Path>, options: &DeleteOptions, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::delete", ResultShape::Void, handler)?;
        let path = owned(path);
        let recursive = options.recursive;
        self.submit("delete", completion, move || async move {
            LocalFileSystem::new()
                .delete(&path, recursive)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`delete`](Self::delete)
    ///
    /// # Errors
    ///
    /// Returns `Host` if the delete fails.
    pub fn delete_sync(&self, path: impl AsRef<Path>, options: &DeleteOptions) -> Result<()> {
        Ok(LocalFileSystem::delete_blocking(path.as_ref(), options.recursive)?)
    }

    // ========================================================================
    // CREATION
    // ========================================================================

    /// Create an empty file; fails if it exists
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn create_file(&self, path: impl AsRef<Path>, options: &CreateFileOptions, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::createFile", ResultShape::Void, handler)?;
        let path = owned(path);
        let perms = options.perms.clone();
        self.submit("create_file", completion, move || async move {
            LocalFileSystem::new()
                .create_file(&path, perms.as_deref())
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`create_file`](Self::create_file)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed `perms`, or `Host`.
    pub fn create_file_sync(&self, path: impl AsRef<Path>, options: &CreateFileOptions) -> Result<()> {
        check_perms(options.perms.as_deref())?;
        Ok(LocalFileSystem::create_file_blocking(
            path.as_ref(),
            options.perms.as_deref(),
        )?)
    }

    /// Create a directory
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn mkdir(&self, path: impl AsRef<Path>, options: &MkdirOptions, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::mkdir", ResultShape::Void, handler)?;
        let path = owned(path);
        let perms = options.perms.clone();
        let create_parents = options.create_parents;
        self.submit("mkdir", completion, move || async move {
            LocalFileSystem::new()
                .mkdir(&path, perms.as_deref(), create_parents)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`mkdir`](Self::mkdir)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed `perms`, or `Host`.
    pub fn mkdir_sync(&self, path: impl AsRef<Path>, options: &MkdirOptions) -> Result<()> {
        check_perms(options.perms.as_deref())?;
        Ok(LocalFileSystem::mkdir_blocking(
            path.as_ref(),
            options.perms.as_deref(),
            options.create_parents,
        )?)
    }

    // ========================================================================
    // LINKS
    // ========================================================================

    /// Create a hard link `link` pointing at `existing`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn link(&self, link: impl AsRef<Path>, existing: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::link", ResultShape::Void, handler)?;
        let (link, existing) = (owned(link), owned(existing));
        self.submit("link", completion, move || async move {
            LocalFileSystem::new()
                .link(&link, &existing)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`link`](Self::link)
    ///
    /// # Errors
    ///
    /// Returns `Host` if linking fails.
    pub fn link_sync(&self, link: impl AsRef<Path>, existing: impl AsRef<Path>) -> Result<()> {
        Ok(LocalFileSystem::link_blocking(link.as_ref(), existing.as_ref())?)
    }

    /// Create a symbolic link `link` pointing at `existing`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn symlink(&self, link: impl AsRef<Path>, existing: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::symlink", ResultShape::Void, handler)?;
        let (link, existing) = (owned(link), owned(existing));
        self.submit("symlink", completion, move || async move {
            LocalFileSystem::new()
                .symlink(&link, &existing)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`symlink`](Self::symlink)
    ///
    /// # Errors
    ///
    /// Returns `Host` if linking fails.
    pub fn symlink_sync(&self, link: impl AsRef<Path>, existing: impl AsRef<Path>) -> Result<()> {
        Ok(LocalFileSystem::symlink_blocking(link.as_ref(), existing.as_ref())?)
    }

    /// Read the target of a symbolic link
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn read_symlink(&self, link: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::readSymlink", ResultShape::Value, handler)?;
        let link = owned(link);
        self.submit("read_symlink", completion, move || async move {
            LocalFileSystem::new()
                .read_symlink(&link)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`read_symlink`](Self::read_symlink)
    ///
    /// # Errors
    ///
    /// Returns `Host` if `link` is not a readable symlink.
    pub fn read_symlink_sync(&self, link: impl AsRef<Path>) -> Result<String> {
        Ok(LocalFileSystem::read_symlink_blocking(link.as_ref())?)
    }

    /// Remove a link
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn unlink(&self, link: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::unlink", ResultShape::Void, handler)?;
        let link = owned(link);
        self.submit("unlink", completion, move || async move {
            LocalFileSystem::new()
                .unlink(&link)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`unlink`](Self::unlink)
    ///
    /// # Errors
    ///
    /// Returns `Host` if removal fails.
    pub fn unlink_sync(&self, link: impl AsRef<Path>) -> Result<()> {
        Ok(LocalFileSystem::unlink_blocking(link.as_ref())?)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Whether `path` exists
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn exists(&self, path: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::exists", ResultShape::Value, handler)?;
        let path = owned(path);
        self.submit("exists", completion, move || async move {
            LocalFileSystem::new()
                .exists(&path)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`exists`](Self::exists)
    ///
    /// # Errors
    ///
    /// Returns `Host` for failures other than the path being absent.
    pub fn exists_sync(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(LocalFileSystem::exists_blocking(path.as_ref())?)
    }

    /// Properties of `path`, following symlinks
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn props(&self, path: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::props", ResultShape::Value, handler)?;
        let path = owned(path);
        self.submit("props", completion, move || async move {
            LocalFileSystem::new()
                .props(&path)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`props`](Self::props)
    ///
    /// # Errors
    ///
    /// Returns `Host` if `path` cannot be inspected.
    pub fn props_sync(&self, path: impl AsRef<Path>) -> Result<FileProps> {
        Ok(LocalFileSystem::props_blocking(path.as_ref())?)
    }

    /// Properties of `path` itself, not following symlinks
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn lprops(&self, path: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::lprops", ResultShape::Value, handler)?;
        let path = owned(path);
        self.submit("lprops", completion, move || async move {
            LocalFileSystem::new()
                .lprops(&path)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`lprops`](Self::lprops)
    ///
    /// # Errors
    ///
    /// Returns `Host` if `path` cannot be inspected.
    pub fn lprops_sync(&self, path: impl AsRef<Path>) -> Result<FileProps> {
        Ok(LocalFileSystem::lprops_blocking(path.as_ref())?)
    }

    /// Capacity of the file system holding `path`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn fs_props(&self, path: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::fsProps", ResultShape::Value, handler)?;
        let path = owned(path);
        self.submit("fs_props", completion, move || async move {
            LocalFileSystem::new()
                .fs_props(&path)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`fs_props`](Self::fs_props)
    ///
    /// # Errors
    ///
    /// Returns `Host` if the file system cannot be queried.
    pub fn fs_props_sync(&self, path: impl AsRef<Path>) -> Result<FileSystemProps> {
        Ok(LocalFileSystem::fs_props_blocking(path.as_ref())?)
    }

    /// List a directory as sorted full paths
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn read_dir(&self, path: impl AsRef<Path>, options: &ReadDirOptions, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::readDir", ResultShape::Value, handler)?;
        let path = owned(path);
        let filter = options.filter.clone();
        self.submit("read_dir", completion, move || async move {
            LocalFileSystem::new()
                .read_dir(&path, filter.as_deref())
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`read_dir`](Self::read_dir)
    ///
    /// # Errors
    ///
    /// Returns `Host` if the directory cannot be read or the filter is not a
    /// valid regular expression.
    pub fn read_dir_sync(&self, path: impl AsRef<Path>, options: &ReadDirOptions) -> Result<Vec<String>> {
        Ok(LocalFileSystem::read_dir_blocking(
            path.as_ref(),
            options.filter.as_deref(),
        )?)
    }

    // ========================================================================
    // CONTENTS
    // ========================================================================

    /// Read a whole file
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn read_file(&self, path: impl AsRef<Path>, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::readFile", ResultShape::Value, handler)?;
        let path = owned(path);
        self.submit("read_file", completion, move || async move {
            LocalFileSystem::new()
                .read_file(&path)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`read_file`](Self::read_file)
    ///
    /// # Errors
    ///
    /// Returns `Host` if the file cannot be read.
    pub fn read_file_sync(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        Ok(LocalFileSystem::read_file_blocking(path.as_ref())?)
    }

    /// Replace the contents of a file with `data` (`Bytes` or `Str`)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `data` is not bytes or a string,
    /// `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn write_file(&self, path: impl AsRef<Path>, data: Value, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::writeFile", ResultShape::Void, handler)?;
        let bytes = Vec::<u8>::from_foreign(data)?;
        let path = owned(path);
        self.submit("write_file", completion, move || async move {
            LocalFileSystem::new()
                .write_file(&path, bytes)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`write_file`](Self::write_file)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for non-byte data, or `Host`.
    pub fn write_file_sync(&self, path: impl AsRef<Path>, data: Value) -> Result<()> {
        let bytes = Vec::<u8>::from_foreign(data)?;
        Ok(LocalFileSystem::write_file_blocking(path.as_ref(), &bytes)?)
    }

    /// Truncate (or extend) a file to `len` bytes
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a negative length, `NotCallable` for a
    /// non-callable handler, or `Dispatch`.
    pub fn truncate(&self, path: impl AsRef<Path>, len: i64, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::truncate", ResultShape::Void, handler)?;
        let len = checked_len(len)?;
        let path = owned(path);
        self.submit("truncate", completion, move || async move {
            LocalFileSystem::new()
                .truncate(&path, len)
                .await
                .map(IntoForeign::into_foreign)
        })
    }

    /// Synchronous form of [`truncate`](Self::truncate)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a negative length, or `Host`.
    pub fn truncate_sync(&self, path: impl AsRef<Path>, len: i64) -> Result<()> {
        Ok(LocalFileSystem::truncate_blocking(path.as_ref(), checked_len(len)?)?)
    }

    // ========================================================================
    // OPEN
    // ========================================================================

    /// Open a file as an [`AsyncFile`] stream, delivered as an `Object`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` for a non-callable handler, or `Dispatch`.
    pub fn open(&self, path: impl AsRef<Path>, options: &OpenOptions, handler: &Value) -> Result<()> {
        let completion = self.completion("FileSystem::open", ResultShape::Value, handler)?;
        let path = owned(path);
        let flags = options.to_flags(self.stream_options.read_chunk_size());
        let queue_size = self.stream_options.write_queue_max_size();
        let context = self.context.clone();
        let executor = self.executor.clone();
        self.submit("open", completion, move || async move {
            let file = LocalFileSystem::new().open(&path, flags).await?;
            Ok(AsyncFile::new(&context, executor, file)
                .with_write_queue_max_size(queue_size)
                .into_foreign())
        })
    }

    /// Synchronous form of [`open`](Self::open)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed `perms`, or `Host`.
    pub fn open_sync(&self, path: impl AsRef<Path>, options: &OpenOptions) -> Result<AsyncFile> {
        check_perms(options.perms.as_deref())?;
        let flags = options.to_flags(self.stream_options.read_chunk_size());
        let file = LocalFileSystem::open_blocking(path.as_ref(), &flags)?;
        Ok(AsyncFile::new(&self.context, self.executor.clone(), file)
            .with_write_queue_max_size(self.stream_options.write_queue_max_size()))
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn completion(&self, site: &str, shape: ResultShape, handler: &Value) -> Result<CompletionAdapter> {
        let handle = self.context.handle(handler, site)?;
        Ok(CompletionAdapter::new(handle, shape))
    }

    fn submit<F, Fut>(&self, op: &'static str, completion: CompletionAdapter, task: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<Value>> + 'static,
    {
        self.executor.submit(op, task, completion)
    }
}

fn owned(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().to_path_buf()
}

fn checked_len(len: i64) -> Result<u64> {
    u64::try_from(len)
        .map_err(|_| BridgeError::invalid_argument(format!("length must be >= 0, got {len}")))
}
