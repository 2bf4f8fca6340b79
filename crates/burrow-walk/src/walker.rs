//! The pull-driven traversal engine.
//!
//! A [`Walker`] keeps a stack of directories still to be listed and a buffer
//! holding the unprocessed remainder of the directory it is draining. Each
//! call to [`Walker::request_next`] resolves entries from that buffer until
//! the requested number have been accepted, listing the next directory from
//! the stack only when the buffer runs dry. Nothing is read ahead of demand.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burrow_core::{
    CompiledFilter, ConfigError, Dirent, Entry, EntryInfo, EntryType, ErrorClass, InodeInfo,
    WalkError, WalkOptions, classify,
};
use compact_str::CompactString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::fs::{FsBackend, RawEntry};
use crate::resolve::{EntryClass, EntryResolver};
use crate::stats::{StatsTracker, WalkStats};

/// One item produced by a pull.
#[derive(Debug)]
pub enum Pulled {
    /// An accepted entry.
    Entry(Entry),
    /// A recoverable error; the walk continues.
    Warning(WalkError),
}

/// Where a walker is between pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Waiting for the next pull.
    Idle,
    /// Resolving entries of the current directory.
    Draining,
    /// Waiting on a directory listing.
    AwaitingListing,
    /// Done. Further pulls yield nothing.
    Finished,
}

/// How entry info is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfoMode {
    Dirent,
    Stat,
    Lstat,
}

#[derive(Debug)]
struct Settings {
    file_filter: CompiledFilter,
    directory_filter: CompiledFilter,
    entry_type: EntryType,
    info_mode: InfoMode,
    max_depth: u32,
    suppress_normal_flow_error: bool,
    high_water_mark: usize,
}

/// A directory being drained.
#[derive(Debug)]
pub(crate) struct DirContext {
    pub full_path: PathBuf,
    /// Path relative to the root; empty for the root itself.
    pub path: PathBuf,
    /// The root is 1.
    pub depth: u32,
    pub real_path: PathBuf,
    /// Inodes of this directory and its ancestors, with their real paths.
    pub lineage: Vec<(InodeInfo, PathBuf)>,
}

/// A directory waiting to be listed.
#[derive(Debug)]
struct PendingDirectory {
    full_path: PathBuf,
    path: PathBuf,
    depth: u32,
    /// Known for every directory but the root.
    real_path: Option<PathBuf>,
    lineage: Vec<(InodeInfo, PathBuf)>,
}

#[derive(Debug)]
struct Listing {
    dir: Arc<DirContext>,
    buffer: VecDeque<RawEntry>,
}

/// A lazy walk over one directory tree.
///
/// Entries within a directory come out in listing order. Subdirectories are
/// expanded depth-first, most recently discovered first, and never before
/// their own entry has been considered.
pub struct Walker {
    root: PathBuf,
    fs: Arc<dyn FsBackend>,
    resolver: EntryResolver,
    settings: Settings,
    frontier: Vec<PendingDirectory>,
    current: Option<Listing>,
    state: WalkState,
    failure: Option<WalkError>,
    cancel: CancellationToken,
    stats: StatsTracker,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("state", &self.state)
            .field("pending_directories", &self.frontier.len())
            .finish_non_exhaustive()
    }
}

impl Walker {
    /// Build a walker rooted at an absolute path. Filters are compiled here.
    pub(crate) fn new(
        root: PathBuf,
        options: &WalkOptions,
        fs: Arc<dyn FsBackend>,
    ) -> Result<Self, ConfigError> {
        let key = options.filter_entry_key;
        let settings = Settings {
            file_filter: CompiledFilter::compile(&options.file_filter, key)?,
            directory_filter: CompiledFilter::compile(&options.directory_filter, key)?,
            entry_type: options.entry_type,
            info_mode: match (options.always_stat, options.lstat) {
                (false, _) => InfoMode::Dirent,
                (true, false) => InfoMode::Stat,
                (true, true) => InfoMode::Lstat,
            },
            max_depth: options.depth,
            suppress_normal_flow_error: options.suppress_normal_flow_error,
            high_water_mark: options.high_water_mark.max(1),
        };

        let frontier = vec![PendingDirectory {
            full_path: root.clone(),
            path: PathBuf::new(),
            depth: 1,
            real_path: None,
            lineage: Vec::new(),
        }];

        let cancel = CancellationToken::new();
        Ok(Self {
            root,
            resolver: EntryResolver::new(Arc::clone(&fs), cancel.clone()),
            fs,
            settings,
            frontier,
            current: None,
            state: WalkState::Idle,
            failure: None,
            cancel,
            stats: StatsTracker::default(),
        })
    }

    /// The absolute root of this walk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current state.
    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Whether the walk has ended and has nothing left to deliver.
    pub fn is_finished(&self) -> bool {
        self.state == WalkState::Finished && self.failure.is_none()
    }

    /// Batch size the push adapter requests per pull.
    pub fn high_water_mark(&self) -> usize {
        self.settings.high_water_mark
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> WalkStats {
        self.stats.snapshot()
    }

    /// Token that cancels this walk when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the walk. Pending work is dropped at the next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the walk's token has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Pull up to `batch` accepted entries.
    ///
    /// Returns `Ok(Some(items))` with at most `batch` entries plus any
    /// warnings raised on the way, `Ok(None)` once the walk is over, or
    /// `Err` for a fatal error. A fatal error hit mid-batch is held back
    /// until the entries already accepted have been returned. After an
    /// `Err` every pull returns `Ok(None)`.
    ///
    /// A batch of zero is treated as one.
    pub async fn request_next(
        &mut self,
        batch: usize,
    ) -> Result<Option<Vec<Pulled>>, WalkError> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }
        if self.state == WalkState::Finished {
            return Ok(None);
        }

        self.stats.start();
        let mut out = Vec::new();
        let mut budget = batch.max(1);

        while budget > 0 {
            if self.cancel.is_cancelled() {
                self.finish();
                break;
            }

            let next = self.current.as_mut().and_then(|listing| {
                listing
                    .buffer
                    .pop_front()
                    .map(|raw| (Arc::clone(&listing.dir), raw))
            });

            match next {
                Some((dir, raw)) => {
                    self.state = WalkState::Draining;
                    match self.visit(&dir, raw, &mut out).await {
                        Ok(true) => budget -= 1,
                        Ok(false) => {}
                        Err(fatal) => {
                            self.abort(fatal);
                            break;
                        }
                    }
                }
                None => {
                    self.current = None;
                    self.state = WalkState::AwaitingListing;
                    let Some(pending) = self.frontier.pop() else {
                        self.finish();
                        break;
                    };
                    if let Err(fatal) = self.open(pending, &mut out).await {
                        self.abort(fatal);
                        break;
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            self.finish();
            self.failure = None;
            return Ok(None);
        }
        if self.state != WalkState::Finished {
            self.state = WalkState::Idle;
        }
        if out.is_empty() {
            if let Some(err) = self.failure.take() {
                return Err(err);
            }
            return Ok(None);
        }
        Ok(Some(out))
    }

    /// Resolve one listing record. Returns whether an entry was accepted.
    async fn visit(
        &mut self,
        dir: &DirContext,
        raw: RawEntry,
        out: &mut Vec<Pulled>,
    ) -> Result<bool, WalkError> {
        let entry = match self.format_entry(dir, raw).await {
            Ok(entry) => entry,
            Err(err) => {
                self.report(err, out)?;
                return Ok(false);
            }
        };
        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        let class = match self.resolver.classify(&entry, dir).await {
            Ok(class) => class,
            Err(err) => {
                self.report(err, out)?;
                EntryClass::None
            }
        };
        trace!(path = %entry.full_path.display(), ?class, "classified entry");

        match class {
            EntryClass::Directory { real_path, inode } => {
                if !self.settings.directory_filter.matches(&entry) {
                    return Ok(false);
                }
                if dir.depth <= self.settings.max_depth {
                    let mut lineage = dir.lineage.clone();
                    if let Some(inode) = inode {
                        lineage.push((inode, real_path.clone()));
                    }
                    self.frontier.push(PendingDirectory {
                        full_path: entry.full_path.clone(),
                        path: entry.path.clone(),
                        depth: dir.depth.saturating_add(1),
                        real_path: Some(real_path.clone()),
                        lineage,
                    });
                }
                if !self.settings.entry_type.wants_directories() {
                    return Ok(false);
                }
                self.emit(entry, &EntryClass::Directory { real_path, inode }, out);
                Ok(true)
            }
            EntryClass::File => self.accept_file(entry, EntryClass::File, out),
            EntryClass::Other if self.settings.entry_type.wants_everything() => {
                self.accept_file(entry, EntryClass::Other, out)
            }
            EntryClass::Other | EntryClass::None => Ok(false),
        }
    }

    fn accept_file(
        &mut self,
        entry: Entry,
        class: EntryClass,
        out: &mut Vec<Pulled>,
    ) -> Result<bool, WalkError> {
        if !self.settings.file_filter.matches(&entry) || !self.settings.entry_type.wants_files() {
            return Ok(false);
        }
        self.emit(entry, &class, out);
        Ok(true)
    }

    fn emit(&mut self, entry: Entry, class: &EntryClass, out: &mut Vec<Pulled>) {
        self.stats.record_entry(class);
        out.push(Pulled::Entry(entry));
    }

    async fn format_entry(&self, dir: &DirContext, raw: RawEntry) -> Result<Entry, WalkError> {
        let full_path = dir.full_path.join(&raw.name);
        let path = dir.path.join(&raw.name);
        let basename = CompactString::new(raw.name.to_string_lossy());

        let info = match self.settings.info_mode {
            InfoMode::Dirent => {
                let kind = match raw.kind {
                    Some(kind) => kind,
                    None => {
                        self.fs
                            .lstat(&full_path)
                            .await
                            .map_err(|e| WalkError::io(&full_path, e))?
                            .kind
                    }
                };
                EntryInfo::Dirent(Dirent::new(basename.clone(), kind))
            }
            InfoMode::Stat => EntryInfo::Stats(
                self.fs
                    .stat(&full_path)
                    .await
                    .map_err(|e| WalkError::io(&full_path, e))?,
            ),
            InfoMode::Lstat => EntryInfo::Stats(
                self.fs
                    .lstat(&full_path)
                    .await
                    .map_err(|e| WalkError::io(&full_path, e))?,
            ),
        };

        Ok(Entry {
            basename,
            path,
            full_path,
            info,
        })
    }

    /// List a pending directory and make it current.
    async fn open(
        &mut self,
        pending: PendingDirectory,
        out: &mut Vec<Pulled>,
    ) -> Result<(), WalkError> {
        let PendingDirectory {
            full_path,
            path,
            depth,
            real_path,
            mut lineage,
        } = pending;

        let real_path = match real_path {
            Some(real_path) => real_path,
            None => self.resolve_root(&full_path, &mut lineage).await,
        };
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        debug!(path = %full_path.display(), depth, "listing directory");
        self.stats.record_listing(&full_path, depth);
        let entries = match self.fs.read_dir(&full_path).await {
            Ok(entries) => entries,
            Err(err) => {
                self.report(WalkError::io(&full_path, err), out)?;
                Vec::new()
            }
        };

        self.current = Some(Listing {
            dir: Arc::new(DirContext {
                full_path,
                path,
                depth,
                real_path,
                lineage,
            }),
            buffer: entries.into(),
        });
        Ok(())
    }

    /// Real path of the root, falling back to the path as given. In stat
    /// modes the root's inode starts the lineage.
    async fn resolve_root(
        &self,
        full_path: &Path,
        lineage: &mut Vec<(InodeInfo, PathBuf)>,
    ) -> PathBuf {
        let real_path = self
            .fs
            .realpath(full_path)
            .await
            .unwrap_or_else(|_| full_path.to_path_buf());

        if self.settings.info_mode != InfoMode::Dirent && !self.cancel.is_cancelled() {
            if let Ok(Some(inode)) = self.fs.stat(full_path).await.map(|stats| stats.inode) {
                lineage.push((inode, real_path.clone()));
            }
        }
        real_path
    }

    /// Route an error through the classifier.
    fn report(&mut self, err: WalkError, out: &mut Vec<Pulled>) -> Result<(), WalkError> {
        match classify(&err, self.settings.suppress_normal_flow_error) {
            ErrorClass::Warn => {
                debug!(code = err.code(), path = %err.path().display(), "recovered: {err}");
                self.stats.record_warning();
                out.push(Pulled::Warning(err));
                Ok(())
            }
            ErrorClass::Fatal => Err(err),
        }
    }

    fn abort(&mut self, err: WalkError) {
        debug!(code = err.code(), path = %err.path().display(), "walk failed: {err}");
        self.failure = Some(err);
        self.frontier.clear();
        self.current = None;
        self.state = WalkState::Finished;
    }

    fn finish(&mut self) {
        if self.state != WalkState::Finished {
            debug!(root = %self.root.display(), "walk finished");
        }
        self.frontier.clear();
        self.current = None;
        self.state = WalkState::Finished;
    }
}
