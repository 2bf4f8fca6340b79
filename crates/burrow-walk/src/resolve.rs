//! Entry type resolution, including symlink targets and cycle detection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use burrow_core::{Entry, FileKind, InodeInfo, WalkError};
use tokio_util::sync::CancellationToken;

use crate::fs::FsBackend;
use crate::walker::DirContext;

/// What an entry turned out to be once links are followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryClass {
    /// Regular file, directly or through a link.
    File,
    /// Directory, directly or through a link that does not loop.
    Directory {
        /// Real location of the directory.
        real_path: PathBuf,
        /// Inode of the directory, when stats were available.
        inode: Option<InodeInfo>,
    },
    /// Socket, device, fifo, or a link to one.
    Other,
    /// Could not be classified; never emitted, never expanded.
    None,
}

/// Classifies entries, issuing realpath and stat calls for symlinks.
pub(crate) struct EntryResolver {
    fs: Arc<dyn FsBackend>,
    cancel: CancellationToken,
}

impl EntryResolver {
    pub(crate) fn new(fs: Arc<dyn FsBackend>, cancel: CancellationToken) -> Self {
        Self { fs, cancel }
    }

    /// Classify an entry found in `parent`.
    ///
    /// Errors are returned unclassified; the caller routes them through the
    /// error classifier and treats the entry as [`EntryClass::None`].
    pub(crate) async fn classify(
        &self,
        entry: &Entry,
        parent: &DirContext,
    ) -> Result<EntryClass, WalkError> {
        match entry.info.kind() {
            FileKind::File => Ok(EntryClass::File),
            FileKind::Directory => {
                let real_path = link_location(entry, parent);
                let inode = entry.stats().and_then(|stats| stats.inode);
                check_lineage(entry, inode, parent)?;
                Ok(EntryClass::Directory { real_path, inode })
            }
            FileKind::Symlink => self.follow(entry, parent).await,
            FileKind::Other => Ok(EntryClass::Other),
        }
    }

    async fn follow(&self, entry: &Entry, parent: &DirContext) -> Result<EntryClass, WalkError> {
        let full_path = &entry.full_path;
        let target = self
            .fs
            .realpath(full_path)
            .await
            .map_err(|e| WalkError::io(full_path, e))?;
        if self.cancel.is_cancelled() {
            return Ok(EntryClass::None);
        }
        let target_stats = self
            .fs
            .stat(&target)
            .await
            .map_err(|e| WalkError::io(&target, e))?;

        match target_stats.kind {
            FileKind::File => Ok(EntryClass::File),
            FileKind::Directory => {
                let location = link_location(entry, parent);
                if is_within(&location, &target) || is_within(full_path, &target) {
                    return Err(WalkError::CircularSymlink {
                        path: full_path.clone(),
                        target,
                    });
                }
                check_lineage(entry, target_stats.inode, parent)?;
                Ok(EntryClass::Directory {
                    real_path: target,
                    inode: target_stats.inode,
                })
            }
            _ => Ok(EntryClass::Other),
        }
    }
}

/// Where the entry really lives: the parent's real path plus the entry name.
fn link_location(entry: &Entry, parent: &DirContext) -> PathBuf {
    match entry.full_path.file_name() {
        Some(name) => parent.real_path.join(name),
        None => entry.full_path.clone(),
    }
}

/// Segment-aware ancestry: `/a/bb` is not within `/a/b`.
fn is_within(path: &Path, ancestor: &Path) -> bool {
    path.starts_with(ancestor)
}

/// A directory whose inode matches one of its ancestors closes a loop.
fn check_lineage(
    entry: &Entry,
    inode: Option<InodeInfo>,
    parent: &DirContext,
) -> Result<(), WalkError> {
    let Some(inode) = inode else {
        return Ok(());
    };
    match parent.lineage.iter().find(|(seen, _)| *seen == inode) {
        Some((_, ancestor)) => Err(WalkError::CircularSymlink {
            path: entry.full_path.clone(),
            target: ancestor.clone(),
        }),
        None => Ok(()),
    }
}
