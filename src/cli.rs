//! Command-line interface definitions
//!
//! This module organizes CLI arguments by **functional usage** - each group
//! contains the options needed by a specific component or subsystem.
//!
//! The CLI plays the foreign side: every subcommand is one `FileSystem`
//! operation whose handler is a native callable.

use crate::executor::ExecutorOptions;
use crate::foreign::{IntoForeign, Value};
use crate::fs::{CopyOptions, DeleteOptions, FileSystem, MkdirOptions, ReadDirOptions};
use anyhow::Result;
use clap::{Parser, Subcommand};
use compio_host_io::parse_perms;
use std::path::PathBuf;

/// Run file-system operations through the callback bridge
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Operation to run
    #[command(subcommand)]
    pub command: Command,

    /// Execution strategy configuration
    #[command(flatten)]
    pub executor: ExecutorConfig,

    /// Output and logging configuration
    #[command(flatten)]
    pub output: OutputConfig,
}

// ============================================================================
// FUNCTIONAL GROUPS: Organized by what component consumes them
// ============================================================================

/// Execution strategy configuration
///
/// Used by: `Executor::new()`, `main()`
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Execution Options")]
pub struct ExecutorConfig {
    /// Run operations on a dispatcher thread pool instead of the event loop
    #[arg(long)]
    pub pooled: bool,

    /// Number of pool threads (0 = auto-detect)
    #[arg(long, default_value = "0", requires = "pooled")]
    pub threads: usize,

    /// Call the synchronous form of the operation instead of passing a handler
    #[arg(long, conflicts_with = "pooled")]
    pub sync: bool,
}

impl ExecutorConfig {
    /// Convert to the options struct used by `Executor`
    #[must_use]
    pub fn to_options(&self) -> ExecutorOptions {
        if self.pooled {
            ExecutorOptions::pooled(self.threads)
        } else {
            ExecutorOptions::event_loop()
        }
    }

    /// Validate execution configuration
    ///
    /// # Errors
    ///
    /// Returns an error if more than 1024 pool threads are requested.
    pub fn validate(&self) -> Result<()> {
        if self.threads > 1024 {
            anyhow::bail!("Thread count must be <= 1024, got: {}", self.threads);
        }
        Ok(())
    }
}

/// Output and logging configuration
///
/// Used by: `main()`, logging initialization
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Output Options")]
pub struct OutputConfig {
    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl OutputConfig {
    /// Log level for the verbosity flags
    #[must_use]
    pub const fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// File-system operations
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print whether a path exists
    Exists {
        /// Path to check
        path: PathBuf,
    },
    /// Print file properties
    Props {
        /// Path to inspect
        path: PathBuf,
    },
    /// Print file properties without following symlinks
    Lprops {
        /// Path to inspect
        path: PathBuf,
    },
    /// Print capacity of the file system holding a path
    FsProps {
        /// Any path on the file system
        path: PathBuf,
    },
    /// List a directory
    ReadDir {
        /// Directory to list
        path: PathBuf,
        /// Only list entries whose name matches this regular expression
        #[arg(long)]
        filter: Option<String>,
    },
    /// Create a directory
    Mkdir {
        /// Directory to create
        path: PathBuf,
        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
        /// Permissions, e.g. rwxr-x---
        #[arg(long)]
        perms: Option<String>,
    },
    /// Copy a file or directory
    Copy {
        /// Source path
        from: PathBuf,
        /// Destination path (must not exist)
        to: PathBuf,
        /// Copy directories recursively
        #[arg(short, long)]
        recursive: bool,
    },
    /// Delete a file or directory
    Delete {
        /// Path to delete
        path: PathBuf,
        /// Delete directories recursively
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print the contents of a file
    Cat {
        /// File to read
        path: PathBuf,
    },
}

// ============================================================================
// IMPLEMENTATION: Validation and dispatch
// ============================================================================

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - Both --quiet and --verbose options are used
    /// - The thread count is out of bounds
    /// - A permission string is malformed
    pub fn validate(&self) -> Result<()> {
        if self.output.quiet && self.output.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        self.executor.validate()?;

        if let Command::Mkdir {
            perms: Some(perms), ..
        } = &self.command
        {
            parse_perms(perms)?;
        }

        Ok(())
    }
}

impl Command {
    /// Start the asynchronous form of the operation; `handler` receives the result
    ///
    /// # Errors
    ///
    /// Returns an error if the operation could not be submitted.
    pub fn submit(&self, fs: &FileSystem, handler: &Value) -> crate::Result<()> {
        match self {
            Self::Exists { path } => fs.exists(path, handler),
            Self::Props { path } => fs.props(path, handler),
            Self::Lprops { path } => fs.lprops(path, handler),
            Self::FsProps { path } => fs.fs_props(path, handler),
            Self::ReadDir { path, filter } => fs.read_dir(
                path,
                &ReadDirOptions {
                    filter: filter.clone(),
                },
                handler,
            ),
            Self::Mkdir {
                path,
                parents,
                perms,
            } => fs.mkdir(path, &mkdir_options(*parents, perms.as_ref()), handler),
            Self::Copy {
                from,
                to,
                recursive,
            } => fs.copy(from, to, &CopyOptions { recursive: *recursive }, handler),
            Self::Delete { path, recursive } => {
                fs.delete(path, &DeleteOptions { recursive: *recursive }, handler)
            }
            Self::Cat { path } => fs.read_file(path, handler),
        }
    }

    /// Run the synchronous form of the operation
    ///
    /// # Errors
    ///
    /// Returns the bridge error of the synchronous call.
    pub fn run_sync(&self, fs: &FileSystem) -> crate::Result<Value> {
        Ok(match self {
            Self::Exists { path } => fs.exists_sync(path)?.into_foreign(),
            Self::Props { path } => fs.props_sync(path)?.into_foreign(),
            Self::Lprops { path } => fs.lprops_sync(path)?.into_foreign(),
            Self::FsProps { path } => fs.fs_props_sync(path)?.into_foreign(),
            Self::ReadDir { path, filter } => fs
                .read_dir_sync(
                    path,
                    &ReadDirOptions {
                        filter: filter.clone(),
                    },
                )?
                .into_foreign(),
            Self::Mkdir {
                path,
                parents,
                perms,
            } => fs
                .mkdir_sync(path, &mkdir_options(*parents, perms.as_ref()))?
                .into_foreign(),
            Self::Copy {
                from,
                to,
                recursive,
            } => fs
                .copy_sync(from, to, &CopyOptions { recursive: *recursive })?
                .into_foreign(),
            Self::Delete { path, recursive } => fs
                .delete_sync(path, &DeleteOptions { recursive: *recursive })?
                .into_foreign(),
            Self::Cat { path } => fs.read_file_sync(path)?.into_foreign(),
        })
    }
}

fn mkdir_options(create_parents: bool, perms: Option<&String>) -> MkdirOptions {
    MkdirOptions {
        perms: perms.cloned(),
        create_parents,
    }
}
