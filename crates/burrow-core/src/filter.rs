//! Filter specifications and their compiled predicates.
//!
//! A filter is given as a predicate, a single glob, or a list of globs where
//! entries starting with `!` exclude. Whatever the shape, it is compiled once
//! into a [`CompiledFilter`] and never inspected again per entry.

use std::fmt;
use std::sync::Arc;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::entry::Entry;
use crate::error::ConfigError;

/// Boolean predicate over an entry.
pub type Predicate = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// Which entry field glob filters match against.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilterKey {
    /// Name within the parent directory.
    #[default]
    Basename,
    /// Path relative to the walk root.
    Path,
}

/// A filter as the caller supplies it.
#[derive(Clone, Default)]
pub enum FilterSpec {
    /// Accept everything.
    #[default]
    All,
    /// Caller-provided predicate, used unchanged.
    Predicate(Predicate),
    /// A single glob pattern.
    Glob(String),
    /// Several globs; `!pattern` entries exclude.
    Globs(Vec<String>),
}

impl FilterSpec {
    /// Wrap a closure as a filter.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Read a filter from a JSON value: a string, an array of strings, or null.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Self::All),
            Value::String(pattern) => Ok(Self::Glob(pattern.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(pattern) => Ok(pattern.clone()),
                    other => Err(ConfigError::InvalidFilterSpec {
                        message: format!("array items must be strings, got {other}"),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Globs),
            other => Err(ConfigError::InvalidFilterSpec {
                message: format!(
                    "filters must be a function, a glob string, or an array of globs, got {other}"
                ),
            }),
        }
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
            Self::Glob(pattern) => f.debug_tuple("Glob").field(pattern).finish(),
            Self::Globs(patterns) => f.debug_tuple("Globs").field(patterns).finish(),
        }
    }
}

impl From<&str> for FilterSpec {
    fn from(pattern: &str) -> Self {
        Self::Glob(pattern.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(pattern: String) -> Self {
        Self::Glob(pattern)
    }
}

impl From<Vec<String>> for FilterSpec {
    fn from(patterns: Vec<String>) -> Self {
        Self::Globs(patterns)
    }
}

impl From<Vec<&str>> for FilterSpec {
    fn from(patterns: Vec<&str>) -> Self {
        Self::Globs(patterns.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FilterSpec {
    fn from(patterns: [&str; N]) -> Self {
        Self::Globs(patterns.into_iter().map(String::from).collect())
    }
}

/// A filter compiled into a single predicate. Cheap to clone and share.
#[derive(Clone)]
pub struct CompiledFilter {
    predicate: Predicate,
}

impl CompiledFilter {
    /// Compile a filter specification against the given entry key.
    pub fn compile(spec: &FilterSpec, key: FilterKey) -> Result<Self, ConfigError> {
        let predicate: Predicate = match spec {
            FilterSpec::All => Arc::new(|_: &Entry| true),
            FilterSpec::Predicate(predicate) => Arc::clone(predicate),
            // A lone `!pattern` negates, as it would inside a list.
            FilterSpec::Glob(pattern) if pattern.trim().starts_with('!') => {
                compile_globs(std::slice::from_ref(pattern), key)?
            }
            FilterSpec::Glob(pattern) => {
                let matcher = build_glob(pattern.trim())?.compile_matcher();
                Arc::new(move |entry: &Entry| matcher.is_match(&*entry.filter_value(key)))
            }
            FilterSpec::Globs(patterns) => compile_globs(patterns, key)?,
        };
        Ok(Self { predicate })
    }

    /// A filter that accepts every entry.
    pub fn accept_all() -> Self {
        Self {
            predicate: Arc::new(|_: &Entry| true),
        }
    }

    /// Returns `true` if the entry passes.
    pub fn matches(&self, entry: &Entry) -> bool {
        (self.predicate)(entry)
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter").finish_non_exhaustive()
    }
}

/// Negatives always exclude; positives, when present, are also required.
fn compile_globs(patterns: &[String], key: FilterKey) -> Result<Predicate, ConfigError> {
    let mut positive = GlobSetBuilder::new();
    let mut negative = GlobSetBuilder::new();
    let mut positive_count = 0usize;
    let mut negative_count = 0usize;

    for pattern in patterns {
        let trimmed = pattern.trim();
        match trimmed.strip_prefix('!') {
            Some(rest) => {
                negative.add(build_glob(rest)?);
                negative_count += 1;
            }
            None => {
                positive.add(build_glob(trimmed)?);
                positive_count += 1;
            }
        }
    }

    let positive = build_set(positive, patterns)?;
    let negative = build_set(negative, patterns)?;

    let predicate: Predicate = match (positive_count > 0, negative_count > 0) {
        (true, true) => Arc::new(move |entry: &Entry| {
            let value = entry.filter_value(key);
            positive.is_match(&*value) && !negative.is_match(&*value)
        }),
        (false, true) => {
            Arc::new(move |entry: &Entry| !negative.is_match(&*entry.filter_value(key)))
        }
        // An empty list has no positive pattern to satisfy and accepts nothing.
        (_, false) => {
            Arc::new(move |entry: &Entry| positive.is_match(&*entry.filter_value(key)))
        }
    };
    Ok(predicate)
}

fn build_glob(pattern: &str) -> Result<Glob, ConfigError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn build_set(builder: GlobSetBuilder, patterns: &[String]) -> Result<GlobSet, ConfigError> {
    builder.build().map_err(|e| ConfigError::InvalidGlob {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}
