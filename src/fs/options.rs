//! One options struct per file-system operation
//!
//! Every field is optional in the sense that `Default` gives the documented
//! behaviour; callers override only what they need:
//!
//! ```rust
//! use callbridge::fs::MkdirOptions;
//!
//! let options = MkdirOptions {
//!     create_parents: true,
//!     ..MkdirOptions::default()
//! };
//! assert!(options.perms.is_none());
//! ```

use crate::error::{BridgeError, Result};
use compio_host_io::{parse_perms, OpenFlags};

/// Options for `chmod`
#[derive(Debug, Clone, Default)]
pub struct ChmodOptions {
    /// When set, apply recursively: directories get these permissions and
    /// everything else gets the operation's `perms`
    pub dir_perms: Option<String>,
}

/// Options for `copy`
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Copy directories with their contents (default: false)
    pub recursive: bool,
}

/// Options for `create_file`
#[derive(Debug, Clone, Default)]
pub struct CreateFileOptions {
    /// Permissions of the new file, e.g. `rw-r-----` (default: host umask)
    pub perms: Option<String>,
}

/// Options for `delete`
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Delete directories with their contents (default: false)
    pub recursive: bool,
}

/// Options for `mkdir`
#[derive(Debug, Clone, Default)]
pub struct MkdirOptions {
    /// Permissions of the new directory (default: host umask)
    pub perms: Option<String>,
    /// Create missing parent directories (default: false)
    pub create_parents: bool,
}

/// Options for `open`
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct OpenOptions {
    /// Permissions used if the file is created (default: host umask)
    pub perms: Option<String>,
    /// Open for reading (default: true)
    pub read: bool,
    /// Open for writing (default: true)
    pub write: bool,
    /// Create the file if it does not exist (default: true)
    pub create: bool,
    /// Fail if the file already exists (default: false)
    pub create_new: bool,
    /// Sync every write to storage before completing it (default: false)
    pub flush: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            perms: None,
            read: true,
            write: true,
            create: true,
            create_new: false,
            flush: false,
        }
    }
}

impl OpenOptions {
    /// Host open flags for these options
    #[must_use]
    pub fn to_flags(&self, chunk_size: usize) -> OpenFlags {
        OpenFlags {
            perms: self.perms.clone(),
            read: self.read,
            write: self.write,
            create: self.create,
            create_new: self.create_new,
            flush: self.flush,
            chunk_size,
        }
    }
}

/// Options for `read_dir`
#[derive(Debug, Clone, Default)]
pub struct ReadDirOptions {
    /// Regular expression an entry name must match in full (default: all entries)
    pub filter: Option<String>,
}

/// Check a permission string such as `rwxr-x---`
///
/// # Errors
///
/// Returns `InvalidArgument` if the string is malformed.
pub fn check_perms(perms: Option<&str>) -> Result<()> {
    if let Some(perms) = perms {
        parse_perms(perms).map_err(|e| BridgeError::invalid_argument(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_defaults() {
        let options = OpenOptions::default();
        assert!(options.read && options.write && options.create);
        assert!(!options.create_new && !options.flush);

        let flags = options.to_flags(4096);
        assert_eq!(flags.chunk_size, 4096);
        assert!(flags.perms.is_none());
    }

    #[test]
    fn test_check_perms() {
        assert!(check_perms(None).is_ok());
        assert!(check_perms(Some("rw-r--r--")).is_ok());
        assert!(matches!(
            check_perms(Some("0644")),
            Err(BridgeError::InvalidArgument(_))
        ));
    }
}
