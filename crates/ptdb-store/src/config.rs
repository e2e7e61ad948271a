use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Default period of the background sync timer.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 60_000;

/// Tunables for a [`Database`](crate::Database).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Period of the background save, in milliseconds.
    #[serde(alias = "syncInterval")]
    pub sync_interval_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
        }
    }
}

impl DbConfig {
    /// The sync period as a [`Duration`].
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> DbResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| DbError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DbError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> DbResult<()> {
        if self.sync_interval_ms == 0 {
            return Err(DbError::InvalidConfig(
                "sync interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
