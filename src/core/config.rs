//! Store configuration, loaded from an optional `mnemo.toml` in the store
//! root. Every knob has a compiled default; a missing file means defaults.

use crate::core::error;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_QUEUE_CAPACITY: usize = 20;
pub const DEFAULT_REQUEST_TTL_DAYS: u64 = 14;
pub const DEFAULT_RESULTS_RETENTION_DAYS: u64 = 90;
pub const DEFAULT_SESSIONS_RETENTION_DAYS: u64 = 180;

pub const CONFIG_FILE_NAME: &str = "mnemo.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Hard bound on rows in `pending` state; enqueue past this fails.
    pub queue_capacity: usize,
    /// Days until a still-pending research request expires.
    pub request_ttl_days: u64,
    /// Default retention for research results during cleanup.
    pub results_retention_days: u64,
    /// Default retention for learning sessions during cleanup.
    pub sessions_retention_days: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_ttl_days: DEFAULT_REQUEST_TTL_DAYS,
            results_retention_days: DEFAULT_RESULTS_RETENTION_DAYS,
            sessions_retention_days: DEFAULT_SESSIONS_RETENTION_DAYS,
        }
    }
}

impl StoreConfig {
    pub fn load(root: &Path) -> Result<Self, error::MnemoError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(error::MnemoError::IoError)?;
        let config: StoreConfig = toml::from_str(&raw).map_err(|e| {
            error::MnemoError::ValidationError(format!(
                "invalid {}: {}",
                CONFIG_FILE_NAME, e
            ))
        })?;
        if config.queue_capacity == 0 {
            return Err(error::MnemoError::ValidationError(
                "queue_capacity must be at least 1".into(),
            ));
        }
        Ok(config)
    }
}
