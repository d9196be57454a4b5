//! # Engine Configuration
//!
//! Configuration management for the OTOP engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     OTOP_DATABASE_PATH=/var/lib/otop/otop.db                           │
//! │     OTOP_MAX_CONFLICT_RETRIES=16                                       │
//! │                                                                         │
//! │  2. Config File (engine.toml)                                          │
//! │     Platform config dir, or an explicit path                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [database]
//! path = "otop.db"
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [ledger]
//! max_conflict_retries = 8
//! initial_backoff_ms = 5
//! max_backoff_ms = 250
//!
//! [reports]
//! week_start = "monday"   # monday | sunday
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use otop_core::WeekStart;
use otop_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Pool size. Concurrent units of work beyond this wait for a connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("otop.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// Pool configuration for these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.path.clone())
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// How a unit of work that loses a write race is re-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Re-runs after the first attempt before giving up with CONFLICT.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// First backoff delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_conflict_retries() -> u32 {
    8
}
fn default_initial_backoff() -> u64 {
    5
}
fn default_max_backoff() -> u64 {
    250
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            max_conflict_retries: default_max_conflict_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Report Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSettings {
    /// First day of the week for daily reports.
    #[serde(default)]
    pub week_start: WeekStart,
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.ledger.initial_backoff_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "ledger.initial_backoff_ms must be greater than 0".into(),
            ));
        }

        if self.ledger.max_backoff_ms < self.ledger.initial_backoff_ms {
            return Err(EngineError::InvalidConfig(format!(
                "ledger.max_backoff_ms ({}) is below initial_backoff_ms ({})",
                self.ledger.max_backoff_ms, self.ledger.initial_backoff_ms
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("OTOP_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("OTOP_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring OTOP_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(retries) = std::env::var("OTOP_MAX_CONFLICT_RETRIES") {
            match retries.parse::<u32>() {
                Ok(n) => self.ledger.max_conflict_retries = n,
                Err(_) => warn!(value = %retries, "Ignoring OTOP_MAX_CONFLICT_RETRIES"),
            }
        }

        if let Ok(ms) = std::env::var("OTOP_INITIAL_BACKOFF_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.ledger.initial_backoff_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring OTOP_INITIAL_BACKOFF_MS"),
            }
        }

        if let Ok(ms) = std::env::var("OTOP_MAX_BACKOFF_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.ledger.max_backoff_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring OTOP_MAX_BACKOFF_MS"),
            }
        }

        if let Ok(day) = std::env::var("OTOP_WEEK_START") {
            match day.parse() {
                Ok(week_start) => self.reports.week_start = week_start,
                Err(_) => warn!(value = %day, "Unknown week start in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "otop", "pos")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
