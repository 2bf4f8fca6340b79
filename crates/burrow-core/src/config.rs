//! Walk configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::ConfigError;
use crate::filter::{FilterKey, FilterSpec};

/// Depth used when no limit is configured.
pub const DEFAULT_DEPTH: u32 = 2_147_483_648;

/// Default number of entries requested per batch by the push adapter.
pub const DEFAULT_HIGH_WATER_MARK: usize = 4096;

/// Which kinds of entries a walk emits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryType {
    /// Regular files (and symlinks resolving to files).
    #[default]
    Files,
    /// Directories (and symlinks resolving to directories).
    Directories,
    /// Both files and directories.
    #[strum(to_string = "files_directories", serialize = "both")]
    #[serde(alias = "both")]
    FilesDirectories,
    /// Everything, including sockets, devices and fifos.
    All,
}

impl EntryType {
    /// Whether directories are emitted.
    pub fn wants_directories(self) -> bool {
        !matches!(self, EntryType::Files)
    }

    /// Whether files are emitted.
    pub fn wants_files(self) -> bool {
        !matches!(self, EntryType::Directories)
    }

    /// Whether non-file, non-directory nodes are emitted.
    pub fn wants_everything(self) -> bool {
        matches!(self, EntryType::All)
    }
}

/// Configuration for a walk. The root is passed separately.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WalkOptions {
    /// Filter applied to files (and other nodes).
    #[builder(default)]
    pub file_filter: FilterSpec,

    /// Filter applied to directories; rejected directories are not descended.
    #[builder(default)]
    pub directory_filter: FilterSpec,

    /// Entry field glob filters match against.
    #[builder(default)]
    pub filter_entry_key: FilterKey,

    /// Kinds of entries to emit.
    #[builder(default)]
    pub entry_type: EntryType,

    /// Use `lstat` instead of `stat` when stats are attached.
    #[builder(default = "false")]
    pub lstat: bool,

    /// Maximum number of expansion hops below the root (0 = direct children only).
    #[builder(default = "DEFAULT_DEPTH")]
    pub depth: u32,

    /// Attach full stats to every entry instead of listing descriptors.
    #[builder(default = "false")]
    pub always_stat: bool,

    /// Downgrade normal-flow errors to warnings.
    #[builder(default = "true")]
    pub suppress_normal_flow_error: bool,

    /// Batch size requested per pull by the push adapter.
    #[builder(default = "DEFAULT_HIGH_WATER_MARK")]
    pub high_water_mark: usize,
}

impl WalkOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.high_water_mark == Some(0) {
            return Err("High water mark must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            file_filter: FilterSpec::All,
            directory_filter: FilterSpec::All,
            filter_entry_key: FilterKey::Basename,
            entry_type: EntryType::Files,
            lstat: false,
            depth: DEFAULT_DEPTH,
            always_stat: false,
            suppress_normal_flow_error: true,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

/// Options as they appear in a JSON document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptions {
    #[serde(default)]
    root: serde_json::Value,
    #[serde(default)]
    file_filter: serde_json::Value,
    #[serde(default)]
    directory_filter: serde_json::Value,
    filter_entry_key: Option<FilterKey>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    #[serde(rename = "entryType")]
    legacy_entry_type: Option<String>,
    lstat: Option<bool>,
    depth: Option<u32>,
    always_stat: Option<bool>,
    suppress_normal_flow_error: Option<bool>,
    high_water_mark: Option<usize>,
}

impl WalkOptions {
    /// Create a new options builder.
    pub fn builder() -> WalkOptionsBuilder {
        WalkOptionsBuilder::default()
    }

    /// Load options from a camelCase JSON object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::InvalidOptions {
                message: format!("expected an object, got {value}"),
            });
        }

        let raw: RawOptions =
            serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidOptions {
                message: e.to_string(),
            })?;

        if !raw.root.is_null() {
            return Err(ConfigError::LegacyRootOption);
        }

        let defaults = Self::default();
        let entry_type = match raw.legacy_entry_type.or(raw.entry_type) {
            Some(value) => value
                .parse::<EntryType>()
                .map_err(|_| ConfigError::InvalidType { value })?,
            None => defaults.entry_type,
        };

        let high_water_mark = raw.high_water_mark.unwrap_or(defaults.high_water_mark);
        if high_water_mark == 0 {
            return Err(ConfigError::InvalidOptions {
                message: "highWaterMark must be at least 1".to_string(),
            });
        }

        Ok(Self {
            file_filter: FilterSpec::from_value(&raw.file_filter)?,
            directory_filter: FilterSpec::from_value(&raw.directory_filter)?,
            filter_entry_key: raw.filter_entry_key.unwrap_or(defaults.filter_entry_key),
            entry_type,
            lstat: raw.lstat.unwrap_or(defaults.lstat),
            depth: raw.depth.unwrap_or(defaults.depth),
            always_stat: raw.always_stat.unwrap_or(defaults.always_stat),
            suppress_normal_flow_error: raw
                .suppress_normal_flow_error
                .unwrap_or(defaults.suppress_normal_flow_error),
            high_water_mark,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_options_builder() {
        let options = WalkOptions::builder()
            .file_filter(["*.js", "!d.js"])
            .entry_type(EntryType::All)
            .depth(3u32)
            .always_stat(true)
            .build()
            .unwrap();

        assert!(matches!(options.file_filter, FilterSpec::Globs(ref p) if p.len() == 2));
        assert!(matches!(options.directory_filter, FilterSpec::All));
        assert_eq!(options.entry_type, EntryType::All);
        assert_eq!(options.depth, 3);
        assert!(options.always_stat);
        assert!(options.suppress_normal_flow_error);
    }

    #[test]
    fn test_options_builder_rejects_zero_batch() {
        let result = WalkOptions::builder().high_water_mark(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_options_default() {
        let options = WalkOptions::default();
        assert_eq!(options.entry_type, EntryType::Files);
        assert_eq!(options.filter_entry_key, FilterKey::Basename);
        assert_eq!(options.depth, DEFAULT_DEPTH);
        assert!(!options.lstat);
        assert!(!options.always_stat);
    }

    #[test]
    fn test_entry_type_parse() {
        assert_eq!("files".parse::<EntryType>().unwrap(), EntryType::Files);
        assert_eq!(
            "both".parse::<EntryType>().unwrap(),
            EntryType::FilesDirectories
        );
        assert_eq!(EntryType::FilesDirectories.to_string(), "files_directories");
        assert!("everything".parse::<EntryType>().is_err());
    }

    #[test]
    fn test_entry_type_wants() {
        assert!(EntryType::Files.wants_files());
        assert!(!EntryType::Files.wants_directories());
        assert!(!EntryType::Directories.wants_files());
        assert!(EntryType::FilesDirectories.wants_directories());
        assert!(!EntryType::FilesDirectories.wants_everything());
        assert!(EntryType::All.wants_everything());
    }

    #[test]
    fn test_from_json() {
        let options = WalkOptions::from_json(&json!({
            "fileFilter": ["*.js", "!d.js"],
            "directoryFilter": "!node_modules",
            "filterEntryKey": "path",
            "type": "files_directories",
            "depth": 2,
            "alwaysStat": true,
            "suppressNormalFlowError": false
        }))
        .unwrap();

        assert_eq!(options.entry_type, EntryType::FilesDirectories);
        assert_eq!(options.filter_entry_key, FilterKey::Path);
        assert_eq!(options.depth, 2);
        assert!(options.always_stat);
        assert!(!options.suppress_normal_flow_error);
        assert!(matches!(options.directory_filter, FilterSpec::Glob(_)));
    }

    #[test]
    fn test_from_json_legacy_entry_type() {
        let options = WalkOptions::from_json(&json!({ "entryType": "both" })).unwrap();
        assert_eq!(options.entry_type, EntryType::FilesDirectories);
    }

    #[test]
    fn test_from_json_rejects() {
        let err = WalkOptions::from_json(&json!({ "root": "/tmp" })).unwrap_err();
        assert!(matches!(err, ConfigError::LegacyRootOption));

        let err = WalkOptions::from_json(&json!({ "type": "folders" })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidType { ref value } if value == "folders"));

        let err = WalkOptions::from_json(&json!({ "fileFilter": 7 })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFilterSpec { .. }));

        let err = WalkOptions::from_json(&json!({ "depth": "deep" })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { .. }));

        let err = WalkOptions::from_json(&json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { .. }));
    }
}
