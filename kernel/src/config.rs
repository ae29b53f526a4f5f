// Log Configuration
//
// Which states count as stable, and how strictly promotion checks
// them. Loaded from JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::state::{IndexState, StableStates};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: stable_states must not be empty")]
    NoStableStates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub stable_states: StableStates,

    /// Decode the source entry at promotion time and refuse to promote
    /// a non-stable one.
    pub validate_on_promote: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl LogConfig {
    /// Default built-in config (used if no config is provided).
    pub fn default_config() -> Self {
        Self {
            stable_states: StableStates::default(),
            validate_on_promote: true,
        }
    }

    pub fn with_stable_states(mut self, states: impl IntoIterator<Item = IndexState>) -> Self {
        self.stable_states = StableStates::new(states);
        self
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: LogConfig = serde_json::from_str(data)?;
        if config.stable_states.is_empty() {
            return Err(ConfigError::NoStableStates);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_json() {
        let json = r#"
        {
          "stable_states": ["ACTIVE", "DELETED"],
          "validate_on_promote": false
        }
        "#;

        let config = LogConfig::from_json_str(json).unwrap();

        assert!(config.stable_states.contains(IndexState::Active));
        assert!(!config.stable_states.contains(IndexState::DoesNotExist));
        assert!(!config.validate_on_promote);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = LogConfig::from_json_str("{}").unwrap();
        assert_eq!(config, LogConfig::default_config());
    }

    #[test]
    fn empty_stable_set_is_rejected() {
        let err = LogConfig::from_json_str(r#"{ "stable_states": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::NoStableStates));
    }
}
