//! Error types and the normal-flow error classifier.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Configuration errors. Always fatal, raised before any I/O happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Root path missing or unusable.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Entry type is not one of the recognised literals.
    #[error("Invalid type {value:?}, expected one of: files, directories, files_directories, all")]
    InvalidType { value: String },

    /// Filter is not a predicate, a glob string, or an array of glob strings.
    #[error("Invalid filter: {message}")]
    InvalidFilterSpec { message: String },

    /// A glob pattern failed to compile.
    #[error("Invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// Options carried the root instead of passing it as its own argument.
    #[error("The root must be passed as its own argument, not inside the options")]
    LegacyRootOption,

    /// Any other malformed option.
    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },
}

/// Filesystem errors raised while walking.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Too many levels of symbolic links.
    #[error("Too many levels of symbolic links: {path}")]
    TooManyLinks { path: PathBuf },

    /// A symlink resolves to one of its own ancestors.
    #[error("Circular symlink detected: {path} points to {target}")]
    CircularSymlink { path: PathBuf, target: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Either kind of failure, for callers that create and drain a walk in one step.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Walk(#[from] WalkError),
}

impl WalkError {
    /// Create a walk error from an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if is_link_loop(&source) {
            return Self::TooManyLinks { path };
        }
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// The path this error occurred at.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::TooManyLinks { path }
            | Self::CircularSymlink { path, .. }
            | Self::Io { path, .. } => path,
        }
    }

    /// Conventional errno-style code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ENOENT",
            Self::PermissionDenied { .. } => "EACCES",
            Self::TooManyLinks { .. } => "ELOOP",
            Self::CircularSymlink { .. } => "ERECURSIVE",
            Self::Io { .. } => "EIO",
        }
    }

    /// Whether this error is expected during an ordinary walk.
    pub fn is_normal_flow(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

/// What the engine does with a filesystem error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Emit a warning, skip the entry, keep walking.
    Warn,
    /// Abort the walk.
    Fatal,
}

/// Classify a filesystem error.
///
/// Normal-flow errors are downgraded to warnings only while
/// `suppress_normal_flow_error` is set; everything else aborts.
pub fn classify(error: &WalkError, suppress_normal_flow_error: bool) -> ErrorClass {
    if suppress_normal_flow_error && error.is_normal_flow() {
        ErrorClass::Warn
    } else {
        ErrorClass::Fatal
    }
}

#[cfg(unix)]
fn is_link_loop(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_link_loop(_error: &io::Error) -> bool {
    false
}
