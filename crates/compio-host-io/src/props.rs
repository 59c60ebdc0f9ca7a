//! File and file-system property snapshots

use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Properties of a single file, directory or link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProps {
    /// Creation time, if the platform reports one
    pub creation_time: Option<SystemTime>,
    /// Last access time
    pub last_access_time: SystemTime,
    /// Last modification time
    pub last_modified_time: SystemTime,
    /// Entry is a directory
    pub is_directory: bool,
    /// Entry is neither a regular file, a directory nor a symlink
    pub is_other: bool,
    /// Entry is a regular file
    pub is_regular_file: bool,
    /// Entry is a symbolic link (only observable via `lprops`)
    pub is_symbolic_link: bool,
    /// Size in bytes
    pub size: u64,
}

impl FileProps {
    /// Build from compio metadata
    #[must_use]
    pub fn from_compio(metadata: &compio::fs::Metadata) -> Self {
        Self::build(
            metadata.created().ok(),
            metadata.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
            metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            metadata.is_dir(),
            metadata.is_file(),
            metadata.is_symlink(),
            metadata.len(),
        )
    }

    /// Build from std metadata
    #[must_use]
    pub fn from_std(metadata: &std::fs::Metadata) -> Self {
        Self::build(
            metadata.created().ok(),
            metadata.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
            metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            metadata.is_dir(),
            metadata.is_file(),
            metadata.is_symlink(),
            metadata.len(),
        )
    }

    const fn build(
        creation_time: Option<SystemTime>,
        last_access_time: SystemTime,
        last_modified_time: SystemTime,
        is_directory: bool,
        is_regular_file: bool,
        is_symbolic_link: bool,
        size: u64,
    ) -> Self {
        Self {
            creation_time,
            last_access_time,
            last_modified_time,
            is_directory,
            is_other: !is_directory && !is_regular_file && !is_symbolic_link,
            is_regular_file,
            is_symbolic_link,
            size,
        }
    }
}

/// Capacity of the file system holding a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSystemProps {
    /// Total size in bytes
    pub total_space: u64,
    /// Free bytes, including those reserved for the superuser
    pub unallocated_space: u64,
    /// Free bytes available to unprivileged users
    pub usable_space: u64,
}

impl FileSystemProps {
    /// Query via `statvfs(3)`
    ///
    /// # Errors
    ///
    /// Returns an error if the path contains a NUL byte or `statvfs` fails.
    pub fn query(path: &Path) -> io::Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path contains a NUL byte: {}", path.display()),
            )
        })?;

        // SAFETY: `stat` is plain old data and fully written by statvfs on success
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &raw mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        #[allow(clippy::unnecessary_cast)] // field widths differ per platform
        let fragment = stat.f_frsize as u64;
        #[allow(clippy::unnecessary_cast)]
        Ok(Self {
            total_space: stat.f_blocks as u64 * fragment,
            unallocated_space: stat.f_bfree as u64 * fragment,
            usable_space: stat.f_bavail as u64 * fragment,
        })
    }
}

/// Parse a 9-character permission string such as `rwxr-x---` into a mode
///
/// # Errors
///
/// Returns `InvalidInput` if the string is not exactly nine characters of
/// `r`, `w`, `x` or `-` in the `rwxrwxrwx` positions.
pub fn parse_perms(perms: &str) -> io::Result<u32> {
    const TEMPLATE: &[u8; 9] = b"rwxrwxrwx";

    let bytes = perms.as_bytes();
    if bytes.len() != TEMPLATE.len() {
        return Err(invalid_perms(perms));
    }

    let mut mode = 0u32;
    for (i, (&actual, &expected)) in bytes.iter().zip(TEMPLATE).enumerate() {
        let bit = 1 << (8 - i);
        if actual == expected {
            mode |= bit;
        } else if actual != b'-' {
            return Err(invalid_perms(perms));
        }
    }
    Ok(mode)
}

fn invalid_perms(perms: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid permission string '{perms}', expected e.g. rwxr-x---"),
    )
}
