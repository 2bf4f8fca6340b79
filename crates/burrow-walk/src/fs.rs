//! Filesystem primitives the walker depends on.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use burrow_core::{FileKind, Stats};

/// Type alias for boxed futures returned by backend methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One record from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Name within the listed directory.
    pub name: OsString,
    /// Type from the listing itself, when the platform provides it cheaply.
    pub kind: Option<FileKind>,
}

impl RawEntry {
    /// Create a new listing record.
    pub fn new(name: impl Into<OsString>, kind: Option<FileKind>) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Directory listing, stat, and real-path resolution.
///
/// Every call is a suspension point for the walker. Implementations must be
/// shareable across tasks; a walker holds one behind an `Arc`.
pub trait FsBackend: Send + Sync {
    /// List a directory, following symlinks in `path`.
    fn read_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<RawEntry>>>;

    /// Metadata, following symlinks.
    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Stats>>;

    /// Metadata of the path itself, not following a final symlink.
    fn lstat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Stats>>;

    /// Canonical absolute path with every symlink resolved.
    fn realpath<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<PathBuf>>;
}

/// The local filesystem, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a new local backend.
    pub fn new() -> Self {
        Self
    }
}

impl FsBackend for LocalFs {
    fn read_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<RawEntry>>> {
        Box::pin(async move {
            let mut dir = tokio::fs::read_dir(path).await?;
            let mut entries = Vec::new();
            while let Some(entry) = dir.next_entry().await? {
                let kind = entry.file_type().await.ok().map(FileKind::from);
                entries.push(RawEntry::new(entry.file_name(), kind));
            }
            Ok(entries)
        })
    }

    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Stats>> {
        Box::pin(async move {
            let metadata = tokio::fs::metadata(path).await?;
            Ok(Stats::from_metadata(&metadata))
        })
    }

    fn lstat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Stats>> {
        Box::pin(async move {
            let metadata = tokio::fs::symlink_metadata(path).await?;
            Ok(Stats::from_metadata(&metadata))
        })
    }

    fn realpath<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<PathBuf>> {
        Box::pin(tokio::fs::canonicalize(path))
    }
}
