//! Engine configuration, loadable from TOML.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunable engine settings.
///
/// Every field has a default, so an empty file (or no file) is valid:
///
/// ```toml
/// hash_megabytes = 64
/// book_ply_limit = 10
/// max_depth = 64
/// move_overhead_ms = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transposition table size, rounded down to a power-of-two entry count.
    pub hash_megabytes: usize,
    /// The opening book is consulted only while the state stack, which holds
    /// one entry per played ply plus the root, is shorter than this. A limit of
    /// `n` therefore allows book moves for the first `n - 1` plies.
    pub book_ply_limit: usize,
    /// Default iterative-deepening limit when a search does not name one.
    pub max_depth: u8,
    /// Default node budget; `None` means unlimited.
    pub max_nodes: Option<u64>,
    /// Safety margin subtracted from clock-derived move times.
    pub move_overhead_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hash_megabytes: 16,
            book_ply_limit: 10,
            max_depth: 64,
            max_nodes: None,
            move_overhead_ms: 30,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or returns the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_megabytes == 0 {
            return Err(ConfigError::Invalid("hash_megabytes must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = EngineConfig::from_toml("hash_megabytes = 4\nmax_nodes = 5000\n").unwrap();
        assert_eq!(config.hash_megabytes, 4);
        assert_eq!(config.max_nodes, Some(5000));
        assert_eq!(config.book_ply_limit, 10);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml("hash_megabytes = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml("max_depth = \"deep\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn missing_file_is_default() {
        let config = EngineConfig::load(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
