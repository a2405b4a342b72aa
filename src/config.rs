//! Playground configuration loaded from TOML.
//!
//! ```toml
//! [pacing]
//! step_gap_ms = 400
//! scan_row_ms = 200
//! speed = 2.0
//!
//! [events]
//! capacity = 1024
//!
//! [logging]
//! filter = "queryscope=debug"
//!
//! [[relations]]
//! name = "users"
//! columns = ["id", "name", "age"]
//! key = "id"
//! rows = [{ id = 1, name = "Alice", age = 24 }]
//! ```
//!
//! A missing file yields the defaults and the built-in fixtures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::board::DEFAULT_EVENT_CAPACITY;
use crate::query::timing::Pacing;
use crate::relation::fixtures::playground_relations;
use crate::relation::{InMemoryRelations, Relation, Value};
use crate::types::Result;

/// Default log filter when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Loaded playground configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlaygroundConfig {
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(default)]
    pacing: PacingSection,
    #[serde(default)]
    events: EventsSection,
    #[serde(default)]
    logging: LoggingSection,
    #[serde(default)]
    relations: Vec<RelationSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct PacingSection {
    step_gap_ms: Option<u64>,
    scan_row_ms: Option<u64>,
    filter_row_ms: Option<u64>,
    match_pair_ms: Option<u64>,
    seek_latency_ms: Option<u64>,
    speed: Option<f64>,
    #[serde(default)]
    instant: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct EventsSection {
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct LoggingSection {
    filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RelationSection {
    name: String,
    columns: Vec<String>,
    key: Option<String>,
    #[serde(default)]
    rows: Vec<BTreeMap<String, Value>>,
}

impl PlaygroundConfig {
    /// Loads `explicit`, or the default path when `None`. Missing files yield
    /// the defaults.
    pub fn load(explicit: Option<PathBuf>) -> std::result::Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let mut config = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => PlaygroundConfig::default(),
        };
        config.path = path;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, ConfigError> {
        let config: PlaygroundConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                origin: "<inline>".into(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Path the configuration was loaded from (or would be).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Disables every delay, keeping the rest of the configuration.
    pub fn with_instant(mut self, instant: bool) -> Self {
        self.pacing.instant = instant;
        self
    }

    /// Overrides the playback speed multiplier.
    pub fn with_speed(mut self, speed: Option<f64>) -> Self {
        if speed.is_some() {
            self.pacing.speed = speed;
        }
        self
    }

    /// Pacing after applying overrides and the speed multiplier.
    ///
    /// Fails when the effective pacing is inconsistent. An instant override
    /// always succeeds, whatever delays the file declares.
    pub fn pacing(&self) -> Result<Pacing> {
        if self.pacing.instant {
            return Ok(Pacing::instant());
        }
        let base = Pacing::default();
        let ms = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };
        let pacing = Pacing {
            step_gap: ms(self.pacing.step_gap_ms, base.step_gap),
            scan_row: ms(self.pacing.scan_row_ms, base.scan_row),
            filter_row: ms(self.pacing.filter_row_ms, base.filter_row),
            match_pair: ms(self.pacing.match_pair_ms, base.match_pair),
            seek_latency: ms(self.pacing.seek_latency_ms, base.seek_latency),
        };
        pacing.validate()?;
        match self.pacing.speed {
            Some(speed) => pacing.with_speed(speed),
            None => Ok(pacing),
        }
    }

    /// Capacity of the event broadcast channel.
    pub fn event_capacity(&self) -> usize {
        self.events.capacity.unwrap_or(DEFAULT_EVENT_CAPACITY)
    }

    /// Log filter directive.
    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Relations declared in the configuration, or the built-in fixtures when
    /// none are declared.
    pub fn relations(&self) -> Result<InMemoryRelations> {
        if self.relations.is_empty() {
            return playground_relations();
        }
        let mut store = InMemoryRelations::new();
        for section in &self.relations {
            let mut relation = Relation::new(
                section.name.clone(),
                section.columns.clone(),
                section.rows.clone(),
            )?;
            if let Some(key) = section.key.as_deref() {
                relation = relation.with_key(key)?;
            }
            store = store.with_relation(relation);
        }
        Ok(store)
    }

    /// Checks everything that command-line overrides cannot change. Pacing is
    /// checked by [`PlaygroundConfig::pacing`] once overrides are applied.
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { reason };
        if self.events.capacity == Some(0) {
            return Err(invalid("events.capacity must be greater than zero".into()));
        }
        self.relations().map_err(|err| invalid(err.to_string()))?;
        Ok(())
    }
}

fn read_file(path: &Path) -> std::result::Result<PlaygroundConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        origin: path.display().to_string(),
        source,
    })
}

/// Errors raised while loading configuration or installing logging.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read playground config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The TOML is malformed or has the wrong shape.
    #[error("failed to parse playground config {origin}: {source}")]
    Parse {
        /// File path or `<inline>`.
        origin: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// The values parsed but are inconsistent.
    #[error("invalid playground config: {reason}")]
    Invalid {
        /// Description of the problem.
        reason: String,
    },
    /// The log filter directive did not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidLogFilter {
        /// Directive as given.
        filter: String,
        /// Parser message.
        reason: String,
    },
    /// A global tracing subscriber was already installed.
    #[error("logging already initialized")]
    LoggingInstalled,
}

/// `<config dir>/queryscope/playground.toml`, when a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("queryscope").join("playground.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RelationStore;

    #[test]
    fn empty_config_uses_defaults_and_fixtures() {
        let config = PlaygroundConfig::from_toml_str("").unwrap();
        assert_eq!(config.pacing().unwrap(), Pacing::default());
        assert_eq!(config.event_capacity(), DEFAULT_EVENT_CAPACITY);
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        let store = config.relations().unwrap();
        assert_eq!(store.relation_names(), vec!["orders", "users"]);
    }

    #[test]
    fn pacing_overrides_and_speed_apply() {
        let config = PlaygroundConfig::from_toml_str(
            "[pacing]\nscan_row_ms = 100\nseek_latency_ms = 1000\nspeed = 2.0\n",
        )
        .unwrap();
        let pacing = config.pacing().unwrap();
        assert_eq!(pacing.scan_row, Duration::from_millis(50));
        assert_eq!(pacing.seek_latency, Duration::from_millis(500));
        assert_eq!(pacing.step_gap, Duration::from_millis(200));
    }

    #[test]
    fn seek_faster_than_scan_is_rejected() {
        let config = PlaygroundConfig::from_toml_str("[pacing]\nseek_latency_ms = 50\n").unwrap();
        let err = config.pacing().unwrap_err();
        assert!(err.to_string().contains("seek latency"), "{err}");
    }

    #[test]
    fn speed_override_is_checked_against_final_pacing() {
        let config = PlaygroundConfig::from_toml_str("").unwrap();
        assert!(config.clone().with_speed(Some(-1.0)).pacing().is_err());
        assert!(config.with_speed(Some(1e-300)).pacing().is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = PlaygroundConfig::from_toml_str("[events]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn relations_replace_fixtures() {
        let config = PlaygroundConfig::from_toml_str(
            r#"
[[relations]]
name = "users"
columns = ["id", "age"]
key = "id"
rows = [{ id = 1, age = 40 }, { id = 2, age = 20 }]
"#,
        )
        .unwrap();
        let store = config.relations().unwrap();
        assert_eq!(store.relation_names(), vec!["users"]);
        let users = store.relation("users").unwrap();
        assert_eq!(users.seek(&Value::Int(2)), Some(1));
    }

    #[test]
    fn undeclared_row_columns_are_rejected() {
        let err = PlaygroundConfig::from_toml_str(
            r#"
[[relations]]
name = "t"
columns = ["a"]
rows = [{ b = 1 }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn instant_overrides_everything() {
        let config = PlaygroundConfig::from_toml_str("[pacing]\nscan_row_ms = 5000\n").unwrap();
        assert!(config.pacing().is_err());
        let config = config.with_instant(true).with_speed(Some(3.0));
        assert_eq!(config.pacing().unwrap(), Pacing::instant());
    }

    #[test]
    fn instant_in_file_skips_delay_checks() {
        let config = PlaygroundConfig::from_toml_str(
            "[pacing]\nscan_row_ms = 5000\nseek_latency_ms = 1\ninstant = true\n",
        )
        .unwrap();
        assert_eq!(config.pacing().unwrap(), Pacing::instant());
    }
}
