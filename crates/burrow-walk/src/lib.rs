//! Lazy, pull-driven directory traversal for burrow.
//!
//! # Overview
//!
//! `burrow-walk` enumerates a directory tree on demand. No directory is
//! listed and no entry is stat'ed until a consumer asks for more entries.
//! Key features:
//!
//! - **Backpressure** through [`Walker::request_next`] and bounded channels
//! - **Glob and predicate filters** for files and directories
//! - **Symlink following** with circular link detection
//! - **Warnings instead of failures** for vanished or unreadable paths
//! - **Pluggable filesystems** via [`FsBackend`]
//!
//! # Example
//!
//! ```rust,no_run
//! use burrow_walk::{EntryType, WalkOptions, walk_collect};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let options = WalkOptions::builder()
//!     .file_filter(["*.rs", "!build.rs"])
//!     .directory_filter("!target")
//!     .entry_type(EntryType::Files)
//!     .build()?;
//!
//! for entry in walk_collect(".", options).await? {
//!     println!("{}", entry.path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! Run a walk in the background and receive its events:
//!
//! ```rust,no_run
//! use burrow_walk::{WalkEvent, WalkOptions, start_walk, traverse};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut events = start_walk(traverse("/var/log", WalkOptions::default())?);
//! while let Some(event) = events.recv().await {
//!     match event {
//!         WalkEvent::Data(entry) => println!("{}", entry.full_path.display()),
//!         WalkEvent::Warn(err) => eprintln!("warning: {err}"),
//!         WalkEvent::Error(err) => return Err(err.into()),
//!         WalkEvent::End => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod fs;
mod memory;
mod output;
mod resolve;
mod stats;
mod walker;

use std::path::Path;
use std::sync::Arc;

pub use fs::{BoxFuture, FsBackend, LocalFs, RawEntry};
pub use memory::MemoryFs;
pub use output::{WALK_CHANNEL_SIZE, WalkEvent, WalkReport, event_stream, start_walk};
pub use resolve::EntryClass;
pub use stats::WalkStats;
pub use walker::{Pulled, WalkState, Walker};

// Re-export core types for convenience
pub use burrow_core::{
    ConfigError, Dirent, Entry, EntryInfo, EntryType, Error, ErrorClass, FileKind, FilterKey,
    FilterSpec, InodeInfo, Stats, Timestamps, WalkError, WalkOptions, WalkOptionsBuilder, classify,
};

/// Create a walk of `root` on the local filesystem.
///
/// Fails only on configuration problems: an empty root or a filter that does
/// not compile. The filesystem is not touched until the first pull.
pub fn traverse(root: impl AsRef<Path>, options: WalkOptions) -> Result<Walker, ConfigError> {
    traverse_with(root, options, Arc::new(LocalFs))
}

/// Create a walk of `root` over any filesystem backend.
pub fn traverse_with(
    root: impl AsRef<Path>,
    options: WalkOptions,
    fs: Arc<dyn FsBackend>,
) -> Result<Walker, ConfigError> {
    let root = root.as_ref();
    if root.as_os_str().is_empty() {
        return Err(ConfigError::InvalidArgument {
            message: "root argument is required".to_string(),
        });
    }

    let root = std::path::absolute(root).map_err(|e| ConfigError::InvalidArgument {
        message: format!("cannot make {} absolute: {e}", root.display()),
    })?;
    Walker::new(root, &options, fs)
}

/// Walk `root` on the local filesystem and collect every accepted entry.
pub async fn walk_collect(
    root: impl AsRef<Path>,
    options: WalkOptions,
) -> Result<Vec<Entry>, Error> {
    Ok(traverse(root, options)?.collect().await?)
}
