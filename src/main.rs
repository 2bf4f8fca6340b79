//! burrow - lazy recursive directory listing.
//!
//! Usage:
//!   burrow [ROOT]                     List files below ROOT
//!   burrow -t all -d 0 [ROOT]         List every direct child of ROOT
//!   burrow -f '*.rs' -D '!target'     Rust sources, skipping target/
//!   burrow --json --stat [ROOT]       One JSON entry per line, with stats
//!   burrow --help                     Show help

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use burrow_core::{EntryType, FilterKey, FilterSpec, WalkOptions};
use burrow_walk::{WalkEvent, start_walk, traverse};

#[derive(Parser)]
#[command(
    name = "burrow",
    version,
    about = "Lazy, recursive, backpressured directory listing",
    long_about = "burrow lists a directory tree one batch at a time.\n\n\
                  Entries are printed as they are found. Unreadable or vanished \
                  paths are reported on stderr and skipped unless --strict is given."
)]
struct Cli {
    /// Directory to walk (defaults to current directory)
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Entry types to list: files, directories, files_directories, all
    #[arg(short = 't', long = "type")]
    entry_type: Option<EntryType>,

    /// Levels to descend below the root (0 lists direct children only)
    #[arg(short, long)]
    depth: Option<u32>,

    /// Glob for files; prefix with '!' to exclude. Repeatable.
    #[arg(short = 'f', long = "filter")]
    file_filter: Vec<String>,

    /// Glob for directories; prefix with '!' to exclude. Repeatable.
    #[arg(short = 'D', long = "dir-filter")]
    directory_filter: Vec<String>,

    /// Entry field globs match against: basename or path
    #[arg(long)]
    key: Option<FilterKey>,

    /// Attach full stats to every entry
    #[arg(long)]
    stat: bool,

    /// With --stat, do not follow symlinks when collecting stats
    #[arg(long, requires = "stat")]
    lstat: bool,

    /// Treat missing, unreadable, and looping paths as fatal
    #[arg(long)]
    strict: bool,

    /// Print each entry as a JSON object
    #[arg(long)]
    json: bool,

    /// Load walk options from a JSON file; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> Result<WalkOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let value: serde_json::Value =
                    serde_json::from_str(&text).context("Config is not valid JSON")?;
                WalkOptions::from_json(&value).context("Invalid config")?
            }
            None => WalkOptions::default(),
        };

        if let Some(entry_type) = self.entry_type {
            options.entry_type = entry_type;
        }
        if let Some(depth) = self.depth {
            options.depth = depth;
        }
        if !self.file_filter.is_empty() {
            options.file_filter = FilterSpec::from(self.file_filter.clone());
        }
        if !self.directory_filter.is_empty() {
            options.directory_filter = FilterSpec::from(self.directory_filter.clone());
        }
        if let Some(key) = self.key {
            options.filter_entry_key = key;
        }
        options.always_stat |= self.stat;
        options.lstat |= self.lstat;
        if self.strict {
            options.suppress_normal_flow_error = false;
        }

        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let options = cli.options()?;
    let walker = traverse(&cli.root, options).context("Invalid walk configuration")?;
    let root = walker.root().to_path_buf();

    let mut events = start_walk(walker);
    let mut warnings = 0usize;
    while let Some(event) = events.recv().await {
        match event {
            WalkEvent::Data(entry) => {
                if cli.json {
                    println!("{}", serde_json::to_string(&entry)?);
                } else {
                    println!("{}", entry.path.display());
                }
            }
            WalkEvent::Warn(err) => {
                warnings += 1;
                eprintln!("warning: [{}] {err}", err.code());
            }
            WalkEvent::Error(err) => {
                return Err(err).with_context(|| format!("Walk of {} failed", root.display()));
            }
            WalkEvent::End => break,
        }
    }

    if warnings > 0 {
        eprintln!("{warnings} warning(s) during walk");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lstat_requires_stat() {
        assert!(Cli::try_parse_from(["burrow", "--lstat"]).is_err());

        let cli = Cli::try_parse_from(["burrow", "--stat", "--lstat"]).unwrap();
        let options = cli.options().unwrap();
        assert!(options.always_stat);
        assert!(options.lstat);
    }
}
