//! Path-based file-system operations
//!
//! Every operation exists twice: an `async fn` for use on the compio event loop
//! and a `*_blocking` twin that performs the same work on the calling thread.
//! Operations compio covers natively (`metadata`, `read`, `write`) go through
//! `compio::fs`; the rest run their blocking twin on compio's blocking pool.

use crate::file::{AsyncFile, OpenFlags};
use crate::props::{parse_perms, FileProps, FileSystemProps};
use regex::Regex;
use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Local file-system host operations
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

/// Run a blocking closure on compio's blocking pool
///
/// # Errors
///
/// Returns the closure's error, or `Other` if the pool task panicked.
pub async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    compio::runtime::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::other(format!("blocking task panicked: {e:?}")))?
}

/// Spawn `future` on the current compio runtime and detach it
///
/// # Errors
///
/// Returns `Other` if the calling thread is not running a compio runtime.
pub fn spawn_detached<F>(future: F) -> io::Result<()>
where
    F: std::future::Future<Output = ()> + 'static,
{
    compio::runtime::Runtime::try_with_current(|runtime| runtime.spawn(future).detach())
        .map_err(|_| io::Error::other("not in a compio runtime"))
}

impl LocalFileSystem {
    /// Create a new `LocalFileSystem`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========================================================================
    // PERMISSIONS
    // ========================================================================

    /// Change permissions of `path`
    ///
    /// With `dir_perms`, applies recursively: directories get `dir_perms`,
    /// everything else gets `perms`.
    ///
    /// # Errors
    ///
    /// Returns an error if a permission string is invalid or any entry cannot
    /// be changed.
    pub async fn chmod(&self, path: &Path, perms: &str, dir_perms: Option<&str>) -> io::Result<()> {
        let path = path.to_path_buf();
        let perms = perms.to_owned();
        let dir_perms = dir_perms.map(str::to_owned);
        blocking(move || Self::chmod_blocking(&path, &perms, dir_perms.as_deref())).await
    }

    /// Blocking twin of [`chmod`](Self::chmod)
    ///
    /// # Errors
    ///
    /// See [`chmod`](Self::chmod).
    pub fn chmod_blocking(path: &Path, perms: &str, dir_perms: Option<&str>) -> io::Result<()> {
        let mode = parse_perms(perms)?;
        let Some(dir_perms) = dir_perms else {
            return fs::set_permissions(path, fs::Permissions::from_mode(mode));
        };

        let dir_mode = parse_perms(dir_perms)?;
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(io::Error::from)?;
            let target = if entry.file_type().is_dir() { dir_mode } else { mode };
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(target))?;
        }
        Ok(())
    }

    // ========================================================================
    // COPY / MOVE / DELETE
    // ========================================================================

    /// Copy `from` to `to`
    ///
    /// A directory is copied as an empty directory unless `recursive` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if `to` already exists or any copy step fails.
    pub async fn copy(&self, from: &Path, to: &Path, recursive: bool) -> io::Result<()> {
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        blocking(move || Self::copy_blocking(&from, &to, recursive)).await
    }

    /// Blocking twin of [`copy`](Self::copy)
    ///
    /// # Errors
    ///
    /// See [`copy`](Self::copy).
    pub fn copy_blocking(from: &Path, to: &Path, recursive: bool) -> io::Result<()> {
        if fs::symlink_metadata(to).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("copy destination already exists: {}", to.display()),
            ));
        }

        let source = fs::metadata(from)?;
        if !source.is_dir() {
            fs::copy(from, to)?;
            return Ok(());
        }
        if !recursive {
            return fs::create_dir(to);
        }

        for entry in WalkDir::new(from) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .map_err(|e| io::Error::other(format!("walk escaped source root: {e}")))?;
            let target = to.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    /// Move (rename) `from` to `to`
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        blocking(move || Self::rename_blocking(&from, &to)).await
    }

    /// Blocking twin of [`rename`](Self::rename)
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn rename_blocking(from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    /// Delete a file, or a directory (recursively if `recursive`)
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, or is a non-empty
    /// directory and `recursive` is not set.
    pub async fn delete(&self, path: &Path, recursive: bool) -> io::Result<()> {
        let path = path.to_path_buf();
        blocking(move || Self::delete_blocking(&path, recursive)).await
    }

    /// Blocking twin of [`delete`](Self::delete)
    ///
    /// # Errors
    ///
    /// See [`delete`](Self::delete).
    pub fn delete_blocking(path: &Path, recursive: bool) -> io::Result<()> {
        let metadata = fs::symlink_metadata(path)?;
        if !metadata.is_dir() {
            fs::remove_file(path)
        } else if recursive {
            fs::remove_dir_all(path)
        } else {
            fs::remove_dir(path)
        }
    }

    // ========================================================================
    // CREATION
    // ========================================================================

    /// Create an empty file; fails if it exists
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists, `perms` is invalid, or creation fails.
    pub async fn create_file(&self, path: &Path, perms: Option<&str>) -> io::Result<()> {
        let path = path.to_path_buf();
        let perms = perms.map(str::to_owned);
        blocking(move || Self::create_file_blocking(&path, perms.as_deref())).await
    }

    /// Blocking twin of [`create_file`](Self::create_file)
    ///
    /// # Errors
    ///
    /// See [`create_file`](Self::create_file).
    pub fn create_file_blocking(path: &Path, perms: Option<&str>) -> io::Result<()> {
        let mode = perms.map(parse_perms).transpose()?;
        fs::OpenOptions::new().write(true).create_new(true).open(path)?;
        if let Some(mode) = mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
        Ok(())
    }

    /// Create a directory
    ///
    /// # Errors
    ///
    /// Returns an error if `perms` is invalid, the directory exists (and
    /// `create_parents` is not set), or a parent is missing.
    pub async fn mkdir(&self, path: &Path, perms: Option<&str>, create_parents: bool) -> io::Result<()> {
        let path = path.to_path_buf();
        let perms = perms.map(str::to_owned);
        blocking(move || Self::mkdir_blocking(&path, perms.as_deref(), create_parents)).await
    }

    /// Blocking twin of [`mkdir`](Self::mkdir)
    ///
    /// # Errors
    ///
    /// See [`mkdir`](Self::mkdir).
    pub fn mkdir_blocking(path: &Path, perms: Option<&str>, create_parents: bool) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(create_parents);
        if let Some(perms) = perms {
            builder.mode(parse_perms(perms)?);
        }
        builder.create(path)
    }

    /// Create a hard link `link` pointing at `existing`
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    pub async fn link(&self, link: &Path, existing: &Path) -> io::Result<()> {
        let (link, existing) = (link.to_path_buf(), existing.to_path_buf());
        blocking(move || Self::link_blocking(&link, &existing)).await
    }

    /// Blocking twin of [`link`](Self::link)
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    pub fn link_blocking(link: &Path, existing: &Path) -> io::Result<()> {
        fs::hard_link(existing, link)
    }

    /// Create a symbolic link `link` pointing at `existing`
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    pub async fn symlink(&self, link: &Path, existing: &Path) -> io::Result<()> {
        let (link, existing) = (link.to_path_buf(), existing.to_path_buf());
        blocking(move || Self::symlink_blocking(&link, &existing)).await
    }

    /// Blocking twin of [`symlink`](Self::symlink)
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    pub fn symlink_blocking(link: &Path, existing: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(existing, link)
    }

    /// Read the target of a symbolic link
    ///
    /// # Errors
    ///
    /// Returns an error if `link` is not a symlink.
    pub async fn read_symlink(&self, link: &Path) -> io::Result<String> {
        let link = link.to_path_buf();
        blocking(move || Self::read_symlink_blocking(&link)).await
    }

    /// Blocking twin of [`read_symlink`](Self::read_symlink)
    ///
    /// # Errors
    ///
    /// Returns an error if `link` is not a symlink.
    pub fn read_symlink_blocking(link: &Path) -> io::Result<String> {
        Ok(fs::read_link(link)?.to_string_lossy().into_owned())
    }

    /// Remove a link (or file) without following it
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be removed.
    pub async fn unlink(&self, link: &Path) -> io::Result<()> {
        compio::fs::remove_file(link).await
    }

    /// Blocking twin of [`unlink`](Self::unlink)
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be removed.
    pub fn unlink_blocking(link: &Path) -> io::Result<()> {
        fs::remove_file(link)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Whether `path` exists (following symlinks)
    ///
    /// # Errors
    ///
    /// Returns errors other than `NotFound`, e.g. permission denied.
    pub async fn exists(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        absent_is_false(compio::fs::metadata(path.as_ref()).await.map(|_| ()))
    }

    /// Blocking twin of [`exists`](Self::exists)
    ///
    /// # Errors
    ///
    /// See [`exists`](Self::exists).
    pub fn exists_blocking(path: &Path) -> io::Result<bool> {
        absent_is_false(fs::metadata(path).map(|_| ()))
    }

    /// Properties of `path`, following symlinks
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be stat'ed.
    pub async fn props(&self, path: &Path) -> io::Result<FileProps> {
        Ok(FileProps::from_compio(&compio::fs::metadata(path).await?))
    }

    /// Blocking twin of [`props`](Self::props)
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be stat'ed.
    pub fn props_blocking(path: &Path) -> io::Result<FileProps> {
        Ok(FileProps::from_std(&fs::metadata(path)?))
    }

    /// Properties of `path` itself, not following symlinks
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be stat'ed.
    pub async fn lprops(&self, path: &Path) -> io::Result<FileProps> {
        Ok(FileProps::from_compio(&compio::fs::symlink_metadata(path).await?))
    }

    /// Blocking twin of [`lprops`](Self::lprops)
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be stat'ed.
    pub fn lprops_blocking(path: &Path) -> io::Result<FileProps> {
        Ok(FileProps::from_std(&fs::symlink_metadata(path)?))
    }

    /// Capacity of the file system containing `path`
    ///
    /// # Errors
    ///
    /// Returns an error if `statvfs` fails.
    pub async fn fs_props(&self, path: &Path) -> io::Result<FileSystemProps> {
        let path = path.to_path_buf();
        blocking(move || FileSystemProps::query(&path)).await
    }

    /// Blocking twin of [`fs_props`](Self::fs_props)
    ///
    /// # Errors
    ///
    /// Returns an error if `statvfs` fails.
    pub fn fs_props_blocking(path: &Path) -> io::Result<FileSystemProps> {
        FileSystemProps::query(path)
    }

    /// List entries of a directory as full paths, sorted
    ///
    /// With `filter`, only entries whose file name fully matches the regular
    /// expression are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is not a valid regex or the directory
    /// cannot be read.
    pub async fn read_dir(&self, path: &Path, filter: Option<&str>) -> io::Result<Vec<String>> {
        let path = path.to_path_buf();
        let filter = filter.map(str::to_owned);
        blocking(move || Self::read_dir_blocking(&path, filter.as_deref())).await
    }

    /// Blocking twin of [`read_dir`](Self::read_dir)
    ///
    /// # Errors
    ///
    /// See [`read_dir`](Self::read_dir).
    pub fn read_dir_blocking(path: &Path, filter: Option<&str>) -> io::Result<Vec<String>> {
        let filter = filter
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid filter: {e}"))
                })
            })
            .transpose()?;

        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name();
            let keep = filter
                .as_ref()
                .is_none_or(|re| re.is_match(&name.to_string_lossy()));
            if keep {
                entries.push(entry.path().to_string_lossy().into_owned());
            }
        }
        entries.sort();
        Ok(entries)
    }

    // ========================================================================
    // CONTENT
    // ========================================================================

    /// Read the whole file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        compio::fs::read(path.as_ref()).await
    }

    /// Blocking twin of [`read_file`](Self::read_file)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file_blocking(path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Replace the file's contents with `data`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn write_file(&self, path: &Path, data: Vec<u8>) -> io::Result<()> {
        compio::fs::write(path, data).await.0
    }

    /// Blocking twin of [`write_file`](Self::write_file)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file_blocking(path: &Path, data: &[u8]) -> io::Result<()> {
        fs::write(path, data)
    }

    /// Truncate (or extend) the file to `len` bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be resized.
    pub async fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        let path = path.to_path_buf();
        blocking(move || Self::truncate_blocking(&path, len)).await
    }

    /// Blocking twin of [`truncate`](Self::truncate)
    ///
    /// # Errors
    ///
    /// See [`truncate`](Self::truncate).
    pub fn truncate_blocking(path: &Path, len: u64) -> io::Result<()> {
        fs::OpenOptions::new().write(true).open(path)?.set_len(len)
    }

    /// Open a file as a host stream
    ///
    /// # Errors
    ///
    /// Returns an error if `perms` is invalid or the file cannot be opened.
    pub async fn open(&self, path: &Path, flags: OpenFlags) -> io::Result<AsyncFile> {
        let path: PathBuf = path.to_path_buf();
        blocking(move || Self::open_blocking(&path, &flags)).await
    }

    /// Blocking twin of [`open`](Self::open)
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_blocking(path: &Path, flags: &OpenFlags) -> io::Result<AsyncFile> {
        AsyncFile::open_blocking(path, flags)
    }
}

/// Map `NotFound` to `Ok(false)` and success to `Ok(true)`
fn absent_is_false(result: io::Result<()>) -> io::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_exists_blocking() {
        let temp_dir = TempDir::new().unwrap();
        assert!(LocalFileSystem::exists_blocking(temp_dir.path()).unwrap());
        assert!(!LocalFileSystem::exists_blocking(&temp_dir.path().join("nope")).unwrap());
    }

    #[compio::test]
    async fn test_exists_async() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();
        assert!(fs.exists(temp_dir.path()).await.unwrap());
        assert!(!fs.exists(temp_dir.path().join("nope")).await.unwrap());
    }

    #[test]
    fn test_mkdir_with_parents_and_perms() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a/b/c");

        let err = LocalFileSystem::mkdir_blocking(&nested, None, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        LocalFileSystem::mkdir_blocking(&nested, Some("rwx------"), true).unwrap();
        let mode = fs::metadata(&nested).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn test_copy_recursive_and_shallow() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/file.txt"), b"payload").unwrap();

        let shallow = temp_dir.path().join("shallow");
        LocalFileSystem::copy_blocking(&src, &shallow, false).unwrap();
        assert!(shallow.is_dir());
        assert!(!shallow.join("sub").exists());

        let deep = temp_dir.path().join("deep");
        LocalFileSystem::copy_blocking(&src, &deep, true).unwrap();
        assert_eq!(fs::read(deep.join("sub/file.txt")).unwrap(), b"payload");

        let err = LocalFileSystem::copy_blocking(&src, &deep, true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_delete_requires_recursive_for_non_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("dir");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("f"), b"x").unwrap();

        assert!(LocalFileSystem::delete_blocking(&dir, false).is_err());
        LocalFileSystem::delete_blocking(&dir, true).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_read_dir_filter_matches_whole_name() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "a.txt.bak", "c.log"] {
            fs::write(temp_dir.path().join(name), b"").unwrap();
        }

        let all = LocalFileSystem::read_dir_blocking(temp_dir.path(), None).unwrap();
        assert_eq!(all.len(), 4);

        let txt = LocalFileSystem::read_dir_blocking(temp_dir.path(), Some(r".*\.txt")).unwrap();
        let names: Vec<_> = txt
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let err = LocalFileSystem::read_dir_blocking(temp_dir.path(), Some("(")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_symlink_lprops_and_read_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target");
        let link = temp_dir.path().join("link");
        fs::write(&target, b"abc").unwrap();

        LocalFileSystem::symlink_blocking(&link, &target).unwrap();
        assert!(LocalFileSystem::lprops_blocking(&link).unwrap().is_symbolic_link);
        assert!(LocalFileSystem::props_blocking(&link).unwrap().is_regular_file);
        assert_eq!(
            LocalFileSystem::read_symlink_blocking(&link).unwrap(),
            target.to_string_lossy()
        );

        LocalFileSystem::unlink_blocking(&link).unwrap();
        assert!(target.exists());
    }

    #[test]
    fn test_chmod_recursive_splits_file_and_dir_modes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("f"), b"").unwrap();

        LocalFileSystem::chmod_blocking(&root, "rw-------", Some("rwx------")).unwrap();
        assert_eq!(fs::metadata(&root).unwrap().permissions().mode() & 0o777, 0o700);
        assert_eq!(
            fs::metadata(root.join("f")).unwrap().permissions().mode() & 0o777,
            0o600
        );
    }

    #[compio::test]
    async fn test_write_read_truncate_async() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data");
        let fs = LocalFileSystem::new();

        fs.write_file(&file, b"hello world".to_vec()).await.unwrap();
        assert_eq!(fs.read_file(&file).await.unwrap(), b"hello world");

        fs.truncate(&file, 5).await.unwrap();
        assert_eq!(fs.read_file(&file).await.unwrap(), b"hello");
        assert_eq!(fs.props(&file).await.unwrap().size, 5);
    }

    #[compio::test]
    async fn test_async_failure_carries_host_error() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();
        let err = fs
            .read_file(temp_dir.path().join("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
