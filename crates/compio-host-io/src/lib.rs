//! # compio-host-io
//!
//! The host side of a callback-driven I/O core built on compio:
//! - Path-based file-system operations (`LocalFileSystem`), each available as an
//!   async operation and as a blocking twin
//! - File and directory property snapshots (`FileProps`, `FileSystemProps`)
//! - A stream over an open file (`AsyncFile`) with pause/resume and a bounded
//!   write queue
//! - An in-process socket (`MemorySocket`) with the same stream contract
//!
//! Stream-like objects implement [`ReadSource`] and [`WriteSink`]. Handlers are
//! plain `Fn` closures that the host invokes from its own execution context,
//! which is either the compio event loop thread or a blocking pool thread.
//!
//! ## Example
//!
//! ```rust,no_run
//! use compio_host_io::LocalFileSystem;
//!
//! # async fn example() -> std::io::Result<()> {
//! let fs = LocalFileSystem::new();
//! if fs.exists("data.txt").await? {
//!     let bytes = fs.read_file("data.txt").await?;
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod fs;
pub mod memory;
pub mod props;
pub mod queue;
pub mod stream;

// Re-export main types
pub use file::{AsyncFile, OpenFlags};
pub use fs::{spawn_detached, LocalFileSystem};
pub use memory::{Frame, FrameKind, MemorySocket, SocketRegistry};
pub use props::{parse_perms, FileProps, FileSystemProps};
pub use queue::WriteQueue;
pub use stream::{Handler, ReadSource, WriteSink};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
