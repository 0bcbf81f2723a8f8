//! Configuration for the ban system

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Ban system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanConfig {
    // Whether ban actions are written to the log sink
    pub log_enabled: bool,
    // File the ban store is loaded from and saved to, see `BanManager::open`
    pub data_file: String,
    // Directory for rotated log files, see `logging::init`
    pub log_dir: String,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            log_enabled: true,
            data_file: "data/bans.yaml".to_string(),
            log_dir: crate::logging::LOG_DIR.to_string(),
        }
    }
}

impl BanConfig {
    /// Load the configuration from a YAML file.
    ///
    /// A missing or unreadable file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let Ok(file_content) = tokio::fs::read_to_string(path).await else {
            return Self::default();
        };

        match serde_yaml::from_str::<Self>(&file_content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed config {}: {e}", path.display());
                Self::default()
            }
        }
    }
}
