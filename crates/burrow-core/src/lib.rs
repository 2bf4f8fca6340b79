//! Core types for burrow.
//!
//! This crate holds the pieces of a walk that do no I/O: entries and their
//! metadata, walk options, compiled filters, and the error types together with
//! the classifier that decides whether a filesystem error is a warning or fatal.

mod config;
mod entry;
mod error;
mod filter;

pub use config::{
    DEFAULT_DEPTH, DEFAULT_HIGH_WATER_MARK, EntryType, WalkOptions, WalkOptionsBuilder,
    WalkOptionsBuilderError,
};
pub use entry::{Dirent, Entry, EntryInfo, FileKind, InodeInfo, Stats, Timestamps};
pub use error::{ConfigError, Error, ErrorClass, WalkError, classify};
pub use filter::{CompiledFilter, FilterKey, FilterSpec, Predicate};
