//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunables shared by composition and assembly.
//! - Load them from JSON, filling unspecified fields with defaults.
//!
//! # Invariants
//! - `max_depth` is at least 1 after a successful load.

use crate::markup::InsertionStrategy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_CHILD_SEPARATOR: &str = "\n";
const DEFAULT_MAX_DEPTH: usize = 32;

/// Tunables for the composition engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How the injection target is chosen inside each template.
    pub strategy: InsertionStrategy,
    /// Joins composed child contents, and composed parts in a document.
    pub child_separator: String,
    /// Nesting levels expanded below a selected child.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: InsertionStrategy::default(),
            child_separator: DEFAULT_CHILD_SEPARATOR.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl EngineConfig {
    /// Parses a JSON object. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use crate::markup::InsertionStrategy;

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.strategy, InsertionStrategy::Placeholder);
        assert_eq!(config.child_separator, "\n");
    }

    #[test]
    fn partial_object_overrides_named_fields() {
        let config =
            EngineConfig::from_json_str(r#"{"strategy":"deepest_element","max_depth":4}"#)
                .unwrap();
        assert_eq!(config.strategy, InsertionStrategy::DeepestElement);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.child_separator, "\n");
    }

    #[test]
    fn zero_depth_is_rejected() {
        let error = EngineConfig::from_json_str(r#"{"max_depth":0}"#).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"child_separator":""}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.child_separator, "");
    }
}
