//! `SimState` configuration module.
//!
//! Provides configuration file support via `simstate.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (CLI flags)
//! 2. Environment variables (`SIMSTATE_*`, nested keys separated by `__`,
//!    e.g. `SIMSTATE_COORDINATOR__DECISION_TIMEOUT_MS=250`)
//! 3. Configuration file (`simstate.toml`)
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::memory::RetentionPolicy;
use crate::retry::RetryPolicy;
use crate::spatial::{DistanceMetric, RoomDef};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Shared cache section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub capacity: usize,
    /// TTL for cached proximity results, in milliseconds (0 = no expiry).
    pub proximity_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            proximity_ttl_ms: 2_000,
        }
    }
}

impl CacheConfig {
    /// Proximity TTL as a duration; `None` when disabled.
    #[must_use]
    pub fn proximity_ttl(&self) -> Option<Duration> {
        (self.proximity_ttl_ms > 0).then(|| Duration::from_millis(self.proximity_ttl_ms))
    }
}

/// Episodic memory section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Events kept per agent (0 = unbounded).
    pub capacity: usize,
    /// Which event is evicted first.
    pub retention: RetentionPolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            retention: RetentionPolicy::LowestSalience,
        }
    }
}

/// Spatial section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Distance metric for proximity and distance queries.
    pub metric: DistanceMetric,
    /// Coarse cell size of the room buckets.
    pub room_cell_size: i32,
    /// Coarse cell size of the occupancy hash.
    pub occupancy_cell_size: i32,
    /// Upper bound on movement search depth.
    pub max_movement: u32,
    /// Radius used to gather nearby occupants when planning.
    pub perception_radius: u32,
    /// Room table.
    pub rooms: Vec<RoomDef>,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Chebyshev,
            room_cell_size: 8,
            occupancy_cell_size: 8,
            max_movement: 16,
            perception_radius: 5,
            rooms: Vec::new(),
        }
    }
}

/// Plan/confirm coordinator section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Default deadline for one decision, in milliseconds.
    pub decision_timeout_ms: u64,
    /// Age after which an unconfirmed plan expires, in milliseconds.
    pub pending_timeout_ms: u64,
    /// Memories passed to the decision function.
    pub context_limit: usize,
    /// Minimum salience of memories passed to the decision function.
    pub context_min_salience: u8,
    /// Save the agent snapshot after every confirmed action.
    pub persist_on_confirm: bool,
    /// Retries around the decision function (0 = none).
    pub decision_retries: u32,
    /// First retry delay, in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Longest retry delay, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            decision_timeout_ms: 5_000,
            pending_timeout_ms: 30_000,
            context_limit: 10,
            context_min_salience: 1,
            persist_on_confirm: true,
            decision_retries: 0,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 2_000,
        }
    }
}

impl CoordinatorConfig {
    /// Decision deadline.
    #[must_use]
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    /// Pending-action expiry.
    #[must_use]
    pub fn pending_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_timeout_ms)
    }

    /// Retry policy for the decision function.
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.decision_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Where agent snapshots are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    /// No persistence.
    None,
    /// Process memory only.
    #[default]
    Memory,
    /// One JSON file per agent under `data_dir`.
    JsonFile,
}

/// Persistence section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Backend.
    pub backend: PersistenceBackend,
    /// Directory for the JSON file backend.
    pub data_dir: String,
    /// Retries of a failed snapshot save after a confirm.
    pub save_retries: u32,
    /// First retry delay, in milliseconds; doubles per retry.
    pub retry_initial_delay_ms: u64,
    /// Retry delay cap, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Memory,
            data_dir: "./simstate_data".to_string(),
            save_retries: 2,
            retry_initial_delay_ms: 50,
            retry_max_delay_ms: 500,
        }
    }
}

impl PersistenceConfig {
    /// Retry policy for snapshot saves.
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.save_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// URL of the HTTP decision backend; empty uses the observe-only decider.
    pub decider_url: String,
    /// HTTP timeout for the decision backend, in milliseconds.
    pub decider_timeout_ms: u64,
    /// Enable permissive CORS.
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            decider_url: String::new(),
            decider_timeout_ms: 10_000,
            cors_enabled: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main `SimState` configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    /// Shared cache configuration.
    pub cache: CacheConfig,
    /// Episodic memory configuration.
    pub memory: MemoryConfig,
    /// Spatial configuration.
    pub spatial: SpatialConfig,
    /// Coordinator configuration.
    pub coordinator: CoordinatorConfig,
    /// Persistence configuration.
    pub persistence: PersistenceConfig,
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl SimConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < file < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("simstate.toml")
    }

    /// Loads configuration from a specific file path. A missing file is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SIMSTATE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", "must be at least 1"));
        }

        if self.spatial.room_cell_size < 1 {
            return Err(invalid(
                "spatial.room_cell_size",
                format!("value {} must be >= 1", self.spatial.room_cell_size),
            ));
        }

        if self.spatial.occupancy_cell_size < 1 {
            return Err(invalid(
                "spatial.occupancy_cell_size",
                format!("value {} must be >= 1", self.spatial.occupancy_cell_size),
            ));
        }

        if self.coordinator.decision_timeout_ms == 0 {
            return Err(invalid("coordinator.decision_timeout_ms", "must be > 0"));
        }

        if self.coordinator.pending_timeout_ms == 0 {
            return Err(invalid("coordinator.pending_timeout_ms", "must be > 0"));
        }

        if !(1..=10).contains(&self.coordinator.context_min_salience) {
            return Err(invalid(
                "coordinator.context_min_salience",
                format!(
                    "value {} is out of range [1, 10]",
                    self.coordinator.context_min_salience
                ),
            ));
        }

        if self.coordinator.retry_initial_delay_ms > self.coordinator.retry_max_delay_ms {
            return Err(invalid(
                "coordinator.retry_initial_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }

        if self.persistence.retry_initial_delay_ms > self.persistence.retry_max_delay_ms {
            return Err(invalid(
                "persistence.retry_initial_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }

        if self.persistence.backend == PersistenceBackend::JsonFile
            && self.persistence.data_dir.trim().is_empty()
        {
            return Err(invalid(
                "persistence.data_dir",
                "required for the json_file backend",
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging.level",
                format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid(
                "logging.format",
                format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.format, valid_formats
                ),
            ));
        }

        crate::spatial::RoomTable::new(self.spatial.rooms.clone(), self.spatial.room_cell_size)
            .map_err(|e| invalid("spatial.rooms", e.to_string()))?;

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
