//! Entry and metadata types produced by a walk.

use std::borrow::Cow;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::filter::FilterKey;

/// Inode information used to spot directories revisited through links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// File metadata timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last modification time.
    pub modified: SystemTime,
    /// Last access time (if available).
    pub accessed: Option<SystemTime>,
    /// Creation time (if available, platform-dependent).
    pub created: Option<SystemTime>,
}

impl Timestamps {
    /// Create timestamps with only modified time.
    pub fn with_modified(modified: SystemTime) -> Self {
        Self {
            modified,
            accessed: None,
            created: None,
        }
    }

    /// Create timestamps with all available times.
    pub fn new(
        modified: SystemTime,
        accessed: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> Self {
        Self {
            modified,
            accessed,
            created,
        }
    }
}

/// Type of a file system node as reported by a listing or a stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (only ever seen without following).
    Symlink,
    /// Other file types (sockets, devices, fifos).
    Other,
}

impl FileKind {
    /// Check if this is a regular file.
    pub fn is_file(self) -> bool {
        self == FileKind::File
    }

    /// Check if this is a directory.
    pub fn is_dir(self) -> bool {
        self == FileKind::Directory
    }

    /// Check if this is a symlink.
    pub fn is_symlink(self) -> bool {
        self == FileKind::Symlink
    }
}

impl From<std::fs::FileType> for FileKind {
    fn from(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        }
    }
}

/// Lightweight directory-entry descriptor: a name plus a cheap type test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirent {
    /// Name within the parent directory.
    pub name: CompactString,
    /// Type reported by the listing (links are not followed).
    pub kind: FileKind,
}

impl Dirent {
    /// Create a new descriptor.
    pub fn new(name: impl Into<CompactString>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Full metadata record returned by `stat`/`lstat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Node type.
    pub kind: FileKind,
    /// Size in bytes.
    pub size: u64,
    /// Number of 512-byte blocks allocated.
    pub blocks: u64,
    /// Number of hard links.
    pub nlink: u64,
    /// Permission bits (unix only).
    pub mode: Option<u32>,
    /// Inode and device, where the platform has them.
    pub inode: Option<InodeInfo>,
    /// Timestamps.
    pub timestamps: Timestamps,
}

impl Stats {
    /// Build a stats record for a node of the given kind with no other data.
    pub fn of_kind(kind: FileKind) -> Self {
        Self {
            kind,
            size: 0,
            blocks: 0,
            nlink: 1,
            mode: None,
            inode: None,
            timestamps: Timestamps::with_modified(std::time::UNIX_EPOCH),
        }
    }

    /// Convert std metadata into a stats record.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            kind: metadata.file_type().into(),
            size: metadata.len(),
            blocks: get_blocks(metadata),
            nlink: get_nlink(metadata),
            mode: get_mode(metadata),
            inode: get_inode(metadata),
            timestamps: Timestamps::new(
                metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
                metadata.accessed().ok(),
                metadata.created().ok(),
            ),
        }
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

impl From<&Metadata> for Stats {
    fn from(metadata: &Metadata) -> Self {
        Self::from_metadata(metadata)
    }
}

/// Metadata attached to an entry: exactly one of a dirent or a stats record,
/// chosen once per walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryInfo {
    /// Cheap descriptor from the directory listing.
    Dirent(Dirent),
    /// Full metadata from `stat` or `lstat`.
    Stats(Stats),
}

impl EntryInfo {
    /// Node type as recorded, without following links.
    pub fn kind(&self) -> FileKind {
        match self {
            EntryInfo::Dirent(dirent) => dirent.kind,
            EntryInfo::Stats(stats) => stats.kind,
        }
    }

    /// The dirent, if this walk attaches dirents.
    pub fn dirent(&self) -> Option<&Dirent> {
        match self {
            EntryInfo::Dirent(dirent) => Some(dirent),
            EntryInfo::Stats(_) => None,
        }
    }

    /// The stats record, if this walk attaches stats.
    pub fn stats(&self) -> Option<&Stats> {
        match self {
            EntryInfo::Stats(stats) => Some(stats),
            EntryInfo::Dirent(_) => None,
        }
    }

    /// Whether the recorded kind is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind().is_file()
    }

    /// Whether the recorded kind is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind().is_dir()
    }

    /// Whether the recorded kind is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind().is_symlink()
    }
}

/// A single file system node emitted by a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name within the parent directory.
    ///
    /// Converted lossily to UTF-8: bytes that are not valid UTF-8 become
    /// U+FFFD, and basename filters match that form. `path` and `full_path`
    /// keep the raw name.
    pub basename: CompactString,
    /// Path relative to the walk root.
    pub path: PathBuf,
    /// Absolute path.
    pub full_path: PathBuf,
    /// Dirent or stats, depending on configuration.
    pub info: EntryInfo,
}

impl Entry {
    /// The value filters match against for the given key.
    pub fn filter_value(&self, key: FilterKey) -> Cow<'_, str> {
        match key {
            FilterKey::Basename => Cow::Borrowed(self.basename.as_str()),
            FilterKey::Path => self.path.to_string_lossy(),
        }
    }

    /// The stats record, when the walk was configured to stat entries.
    pub fn stats(&self) -> Option<&Stats> {
        self.info.stats()
    }

    /// The dirent, when the walk attaches listing descriptors.
    pub fn dirent(&self) -> Option<&Dirent> {
        self.info.dirent()
    }
}

// Cross-platform metadata helpers

#[cfg(unix)]
fn get_inode(metadata: &Metadata) -> Option<InodeInfo> {
    Some(InodeInfo::new(metadata.ino(), metadata.dev()))
}

#[cfg(not(unix))]
fn get_inode(_metadata: &Metadata) -> Option<InodeInfo> {
    None
}

#[cfg(unix)]
fn get_nlink(metadata: &Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn get_nlink(_metadata: &Metadata) -> u64 {
    1
}

#[cfg(unix)]
fn get_mode(metadata: &Metadata) -> Option<u32> {
    Some(metadata.mode())
}

#[cfg(not(unix))]
fn get_mode(_metadata: &Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn get_blocks(metadata: &Metadata) -> u64 {
    metadata.blocks()
}

#[cfg(not(unix))]
fn get_blocks(metadata: &Metadata) -> u64 {
    // Estimate blocks from file size (512-byte blocks, rounded up)
    metadata.len().div_ceil(512)
}
