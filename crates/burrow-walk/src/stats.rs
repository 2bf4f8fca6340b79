//! Walk statistics.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::resolve::EntryClass;

/// Counters describing a walk so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Directories whose listing was requested, including the root.
    pub directories_listed: u64,
    /// Entries handed to the consumer.
    pub entries_emitted: u64,
    /// Emitted entries that were files.
    pub files: u64,
    /// Emitted entries that were directories.
    pub directories: u64,
    /// Emitted entries that were neither.
    pub others: u64,
    /// Errors downgraded to warnings.
    pub warnings: u64,
    /// Deepest directory depth listed (the root is 1).
    pub max_depth: u32,
    /// Directory most recently listed.
    pub current_directory: PathBuf,
    /// Time since the first pull.
    pub elapsed: Duration,
}

impl WalkStats {
    /// Emitted entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_emitted as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Running counters with timing, owned by a walker.
#[derive(Debug, Default)]
pub(crate) struct StatsTracker {
    started: Option<Instant>,
    stats: WalkStats,
}

impl StatsTracker {
    pub fn start(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    pub fn record_listing(&mut self, path: &std::path::Path, depth: u32) {
        self.stats.directories_listed += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);
        self.stats.current_directory = path.to_path_buf();
    }

    pub fn record_entry(&mut self, class: &EntryClass) {
        self.stats.entries_emitted += 1;
        match class {
            EntryClass::File => self.stats.files += 1,
            EntryClass::Directory { .. } => self.stats.directories += 1,
            EntryClass::Other | EntryClass::None => self.stats.others += 1,
        }
    }

    pub fn record_warning(&mut self) {
        self.stats.warnings += 1;
    }

    pub fn snapshot(&self) -> WalkStats {
        WalkStats {
            elapsed: self.started.map(|t| t.elapsed()).unwrap_or_default(),
            ..self.stats.clone()
        }
    }
}
