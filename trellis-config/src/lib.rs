// Configuration management for Trellis dispatchers
//
// Sources are layered in the order they are loaded: later sources override
// earlier ones key by key, and nested tables merge.

pub mod builder;
pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use builder::ConfigBuilder;
pub use env::{DEFAULT_ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use trellis_core::config::DispatchConfig;
use trellis_core::logging::LogConfig;

/// Section holding [`DispatchConfig`].
pub const DISPATCH_SECTION: &str = "dispatch";

/// Section holding [`LogConfig`].
pub const LOGGING_SECTION: &str = "logging";

/// Everything a Trellis service reads from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrellisConfig {
    pub dispatch: DispatchConfig,
    pub logging: LogConfig,
}

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Map<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager reading `TRELLIS_*` variables
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(Map::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Merge a table into the current configuration.
    pub fn merge_value(&self, value: Value) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(ConfigError::ParseError(
                "configuration root must be a table".to_string(),
            ));
        };
        loader::merge_values(&mut self.config.write(), map);
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let vars = loader.load()?;
        tracing::debug!(keys = vars.len(), "loaded configuration from environment");
        self.merge_value(Value::Object(vars))
    }

    /// Load configuration from explicit `(name, value)` variables
    pub fn load_env_from<I, K, V>(&self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.merge_value(Value::Object(loader.load_from(vars)))
    }

    /// Load a `.env` file into the process environment, then the environment
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing default .env is not an error.
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    /// Load configuration from file
    pub fn load_file(&self, path: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        tracing::debug!(path = %path, format = ?format, "loaded configuration file");
        self.merge_value(data)
    }

    /// Load a file, detecting the format from its extension
    pub fn load_file_auto(&self, path: &str) -> Result<()> {
        let format = ConfigLoader::auto(path)?.format();
        self.load_file(path, format)
    }

    /// Set a value at a dotted key such as `dispatch.max_results_cap`
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        let path: Vec<String> = key.split('.').map(str::to_string).collect();
        loader::insert_path(&mut self.config.write(), &path, json_value);
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        let mut segments = key.split('.');
        let mut current = config.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Get a value at a dotted key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager; `other` wins on conflicts
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        let snapshot = other.config.read().clone();
        self.merge_value(Value::Object(snapshot))
    }

    /// Deserialize and validate the whole configuration
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let snapshot = Value::Object(self.config.read().clone());
        let validated: T = serde_json::from_value(snapshot)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;
        Ok(validated)
    }

    /// Deserialize and validate one section; a missing section yields the
    /// type's default.
    pub fn section<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default + Validate,
    {
        let section: T = match self.lookup(key) {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))?,
            None => T::default(),
        };
        section.validate()?;
        Ok(section)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The validated `dispatch` section.
pub fn load_dispatch_config(manager: &ConfigManager) -> Result<DispatchConfig> {
    manager.section(DISPATCH_SECTION)
}

/// The validated `logging` section.
pub fn load_log_config(manager: &ConfigManager) -> Result<LogConfig> {
    manager.section(LOGGING_SECTION)
}
