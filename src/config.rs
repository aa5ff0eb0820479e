//! Indexer configuration
//!
//! A table turns indexing on by carrying `index.planner` in its properties.
//! Every other `index.*` key is handed to the planner as an option with the
//! `index.` prefix removed, except the two keys the indexer reads itself:
//! `index.enabled` and `index.log.level`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};

pub const PLANNER_KEY: &str = "index.planner";
pub const ENABLED_KEY: &str = "index.enabled";
pub const LOG_LEVEL_KEY: &str = "index.log.level";
pub const OPTION_PREFIX: &str = "index.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Indexing settings for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Registry key of the planner; None leaves the table unindexed
    #[serde(default)]
    pub planner: Option<String>,

    /// Planner options, keys without the `index.` prefix
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Master switch (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            planner: None,
            options: BTreeMap::new(),
            enabled: default_enabled(),
            log_level: default_log_level(),
        }
    }
}

impl IndexerConfig {
    /// Config selecting `planner` with `options`
    pub fn with_planner(planner: impl Into<String>, options: BTreeMap<String, String>) -> Self {
        Self {
            planner: Some(planner.into()),
            options,
            ..Self::default()
        }
    }

    /// Read the `index.*` keys of a table's property map
    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, value) in props {
            match key.as_str() {
                PLANNER_KEY => config.planner = Some(value.clone()),
                ENABLED_KEY => {
                    config.enabled = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.clone(),
                        value: value.clone(),
                    })?;
                }
                LOG_LEVEL_KEY => config.log_level = value.clone(),
                _ => {
                    if let Some(option) = key.strip_prefix(OPTION_PREFIX) {
                        config.options.insert(option.to_string(), value.clone());
                    }
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("planner", config.planner.as_deref().unwrap_or("none")),
            ],
        );
        Ok(config)
    }

    /// Back to `index.*` properties
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        if let Some(planner) = &self.planner {
            enable_indexing(&mut props, planner, &self.options);
        }
        props.insert(ENABLED_KEY.to_string(), self.enabled.to_string());
        props.insert(LOG_LEVEL_KEY.to_string(), self.log_level.clone());
        props
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.severity()?;
        if let Some(planner) = &self.planner {
            if planner.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: PLANNER_KEY.to_string(),
                    value: planner.clone(),
                });
            }
        }
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Result<Severity, ConfigError> {
        Severity::parse(&self.log_level).ok_or_else(|| ConfigError::InvalidValue {
            key: LOG_LEVEL_KEY.to_string(),
            value: self.log_level.clone(),
        })
    }

    /// Apply `log_level` to the process-wide logger
    pub fn apply_log_level(&self) -> Result<(), ConfigError> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }

    /// True when a planner is selected and indexing is switched on
    pub fn is_active(&self) -> bool {
        self.enabled && self.planner.is_some()
    }
}

/// Turn on indexing for a table by writing the planner key and its options
/// into the table's property map.
pub fn enable_indexing(
    props: &mut BTreeMap<String, String>,
    planner: &str,
    options: &BTreeMap<String, String>,
) {
    props.insert(PLANNER_KEY.to_string(), planner.to_string());
    for (key, value) in options {
        props.insert(format!("{}{}", OPTION_PREFIX, key), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn options() -> BTreeMap<String, String> {
        let mut options = BTreeMap::new();
        options.insert("covered.columns".to_string(), "f".to_string());
        options
    }

    #[test]
    fn test_default_config_inactive() {
        let config = IndexerConfig::default();
        assert!(config.enabled);
        assert!(!config.is_active());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_enable_indexing_round_trip() {
        let mut props = BTreeMap::new();
        props.insert("table.owner".to_string(), "ops".to_string());
        enable_indexing(&mut props, "covered-columns", &options());

        assert_eq!(props.get(PLANNER_KEY).map(String::as_str), Some("covered-columns"));
        assert_eq!(props.get("index.covered.columns").map(String::as_str), Some("f"));

        let config = IndexerConfig::from_properties(&props).unwrap();
        assert!(config.is_active());
        assert_eq!(config.options, options());
    }

    #[test]
    fn test_reserved_keys_not_passed_as_options() {
        let mut props = BTreeMap::new();
        props.insert(PLANNER_KEY.to_string(), "covered-columns".to_string());
        props.insert(ENABLED_KEY.to_string(), "false".to_string());
        props.insert(LOG_LEVEL_KEY.to_string(), "warn".to_string());

        let config = IndexerConfig::from_properties(&props).unwrap();
        assert!(!config.enabled);
        assert!(!config.is_active());
        assert_eq!(config.severity().unwrap(), Severity::Warn);
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_invalid_enabled_value() {
        let mut props = BTreeMap::new();
        props.insert(ENABLED_KEY.to_string(), "yes".to_string());
        assert!(matches!(
            IndexerConfig::from_properties(&props),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut props = BTreeMap::new();
        props.insert(LOG_LEVEL_KEY.to_string(), "loud".to_string());
        assert!(IndexerConfig::from_properties(&props).is_err());
    }

    #[test]
    fn test_to_properties_inverse() {
        let config = IndexerConfig::with_planner("covered-columns", options());
        let back = IndexerConfig::from_properties(&config.to_properties()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"planner":"covered-columns","options":{{"covered.columns":"f"}}}}"#
        )
        .unwrap();

        let config = IndexerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.planner.as_deref(), Some("covered-columns"));
        assert!(config.enabled);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_file_missing() {
        let err = IndexerConfig::from_file("/nonexistent/aeroindex.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_file_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            IndexerConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
