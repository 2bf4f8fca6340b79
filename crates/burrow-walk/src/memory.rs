//! In-memory filesystem backend.
//!
//! Useful for walking synthetic trees and for reproducing races that are
//! awkward to set up on disk: a node can be removed or made unreadable
//! between two pulls of the same walk.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use burrow_core::{FileKind, InodeInfo, Stats};

use crate::fs::{BoxFuture, FsBackend, RawEntry};

/// Symlink hops allowed while resolving a single path.
const MAX_LINK_HOPS: usize = 40;

/// Device number reported for every node.
const MEMORY_DEVICE: u64 = 1;

#[derive(Debug, Clone)]
enum Node {
    File { size: u64 },
    Directory,
    Symlink { target: PathBuf },
    Other,
}

impl Node {
    fn kind(&self) -> FileKind {
        match self {
            Node::File { .. } => FileKind::File,
            Node::Directory => FileKind::Directory,
            Node::Symlink { .. } => FileKind::Symlink,
            Node::Other => FileKind::Other,
        }
    }
}

#[derive(Debug)]
struct Record {
    node: Node,
    inode: u64,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<PathBuf, Record>,
    denied: HashSet<PathBuf>,
    next_inode: u64,
}

/// A filesystem held entirely in memory. Paths are absolute; `/` always exists.
///
/// Listings are returned in byte order of the names.
#[derive(Debug)]
pub struct MemoryFs {
    tree: Mutex<Tree>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only `/`.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            PathBuf::from("/"),
            Record {
                node: Node::Directory,
                inode: 1,
            },
        );
        Self {
            tree: Mutex::new(Tree {
                nodes,
                denied: HashSet::new(),
                next_inode: 2,
            }),
        }
    }

    /// Create a directory and any missing parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        self.insert(path.as_ref(), Node::Directory)
    }

    /// Create a file of the given size, creating missing parents.
    pub fn add_file(&self, path: impl AsRef<Path>, size: u64) -> &Self {
        self.insert(path.as_ref(), Node::File { size })
    }

    /// Create a symlink pointing at `target` (absolute, or relative to the link's parent).
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) -> &Self {
        self.insert(
            path.as_ref(),
            Node::Symlink {
                target: target.into(),
            },
        )
    }

    /// Create a node that is neither a file, a directory, nor a symlink.
    pub fn add_other(&self, path: impl AsRef<Path>) -> &Self {
        self.insert(path.as_ref(), Node::Other)
    }

    /// Remove a node and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) -> &Self {
        let path = absolute(path.as_ref());
        self.lock().nodes.retain(|p, _| !p.starts_with(&path));
        self
    }

    /// Make listing this directory fail with permission denied.
    pub fn deny(&self, path: impl AsRef<Path>) -> &Self {
        self.lock().denied.insert(absolute(path.as_ref()));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, path: &Path, node: Node) -> &Self {
        let path = absolute(path);
        let mut tree = self.lock();

        let missing: Vec<PathBuf> = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| !tree.nodes.contains_key(*ancestor))
            .map(Path::to_path_buf)
            .collect();
        for dir in missing {
            let inode = tree.allocate_inode();
            tree.nodes.insert(
                dir,
                Record {
                    node: Node::Directory,
                    inode,
                },
            );
        }

        let inode = tree.allocate_inode();
        tree.nodes.insert(path, Record { node, inode });
        self
    }

    fn list(&self, path: &Path) -> io::Result<Vec<RawEntry>> {
        let tree = self.lock();
        let resolved = tree.resolve(path, true)?;
        if tree.denied.contains(&resolved) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            ));
        }
        match tree.nodes.get(&resolved).map(|r| &r.node) {
            Some(Node::Directory) => {}
            _ => return Err(not_a_directory(path)),
        }

        Ok(tree
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(resolved.as_path()))
            .filter_map(|(p, record)| {
                p.file_name()
                    .map(|name| RawEntry::new(name, Some(record.node.kind())))
            })
            .collect())
    }

    fn metadata(&self, path: &Path, follow: bool) -> io::Result<Stats> {
        let tree = self.lock();
        let resolved = tree.resolve(path, follow)?;
        let record = tree.nodes.get(&resolved).ok_or_else(|| not_found(path))?;

        let mut stats = Stats::of_kind(record.node.kind());
        stats.inode = Some(InodeInfo::new(record.inode, MEMORY_DEVICE));
        if let Node::File { size } = record.node {
            stats.size = size;
            stats.blocks = size.div_ceil(512);
        }
        Ok(stats)
    }

    fn canonical(&self, path: &Path) -> io::Result<PathBuf> {
        self.lock().resolve(path, true)
    }
}

impl Tree {
    fn allocate_inode(&mut self) -> u64 {
        let inode = self.next_inode;
        self.next_inode += 1;
        inode
    }

    /// Resolve `path` to the key of an existing node.
    fn resolve(&self, path: &Path, follow_last: bool) -> io::Result<PathBuf> {
        let mut resolved = PathBuf::from("/");
        let mut pending = reversed_components(path);
        let mut hops = 0usize;

        while let Some(part) = pending.pop() {
            if part == ".." {
                resolved.pop();
                continue;
            }

            let candidate = resolved.join(&part);
            let record = self.nodes.get(&candidate).ok_or_else(|| not_found(path))?;
            let is_last = pending.is_empty();

            match &record.node {
                Node::Symlink { target } if follow_last || !is_last => {
                    hops += 1;
                    if hops > MAX_LINK_HOPS {
                        return Err(link_loop(path));
                    }
                    if target.is_absolute() {
                        resolved = PathBuf::from("/");
                    }
                    pending.extend(reversed_components(target));
                }
                Node::File { .. } | Node::Other if !is_last => {
                    return Err(not_a_directory(path));
                }
                _ => resolved = candidate,
            }
        }

        Ok(resolved)
    }
}

impl FsBackend for MemoryFs {
    fn read_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<RawEntry>>> {
        Box::pin(async move { self.list(path) })
    }

    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Stats>> {
        Box::pin(async move { self.metadata(path, true) })
    }

    fn lstat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Stats>> {
        Box::pin(async move { self.metadata(path, false) })
    }

    fn realpath<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<PathBuf>> {
        Box::pin(async move { self.canonical(path) })
    }
}

fn absolute(path: &Path) -> PathBuf {
    Path::new("/").join(path)
}

/// Path components as a stack: the next component to visit is last.
fn reversed_components(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_os_string()),
            Component::ParentDir => Some(OsString::from("..")),
            _ => None,
        })
        .rev()
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotADirectory,
        format!("not a directory: {}", path.display()),
    )
}

#[cfg(unix)]
fn link_loop(_path: &Path) -> io::Error {
    io::Error::from_raw_os_error(libc::ELOOP)
}

#[cfg(not(unix))]
fn link_loop(path: &Path) -> io::Error {
    io::Error::other(format!(
        "too many levels of symbolic links: {}",
        path.display()
    ))
}
