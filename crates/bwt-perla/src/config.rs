//! YAML configuration for the bridge process

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bwt_coordinator::DEFAULT_SCAN_INTERVAL;

/// Configuration load errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Process-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Display language for alarm translations ("en", "de", "de-CH", ...)
    pub language: String,

    /// Poll interval against the device, in seconds
    pub scan_interval: u64,

    /// Directory holding the `.storage/` state
    pub config_dir: PathBuf,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            scan_interval: DEFAULT_SCAN_INTERVAL.as_secs(),
            config_dir: PathBuf::from("."),
        }
    }
}

impl IntegrationConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Poll interval as a duration
    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IntegrationConfig::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.scan_interval, 30);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let config: IntegrationConfig = serde_yaml::from_str("language: de\n").unwrap();
        assert_eq!(config.language, "de");
        assert_eq!(config.scan_interval, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bwt.yaml");
        std::fs::write(&path, "language: de-CH\nscan_interval: 60\n").unwrap();

        let config = IntegrationConfig::load(&path).unwrap();
        assert_eq!(config.language, "de-CH");
        assert_eq!(config.scan_interval().as_secs(), 60);
    }
}
