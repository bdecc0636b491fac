// Environment variable loading

use crate::loader::{coerce_scalar, env_key_path, insert_path};
use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::env;

/// Prefix of environment variables read by default.
pub const DEFAULT_ENV_PREFIX: &str = "TRELLIS";

/// Environment variable loader
///
/// `TRELLIS_DISPATCH__MAX_RESULTS_CAP=50` becomes
/// `{"dispatch": {"max_results_cap": 50}}`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Key of a variable relative to the prefix, or `None` when it does not
    /// carry the prefix.
    fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_')),
            None => Some(key),
        }
    }

    /// Load the process environment as a nested table.
    pub fn load(&self) -> Result<Map<String, Value>> {
        Ok(self.load_from(env::vars()))
    }

    /// Load from explicit variables instead of the process environment.
    pub fn load_from<I, K, V>(&self, vars: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Map::new();
        for (key, value) in vars {
            if let Some(stripped) = self.strip(key.as_ref()) {
                let path = env_key_path(stripped);
                if !path.is_empty() {
                    insert_path(&mut config, &path, coerce_scalar(value.as_ref()));
                }
            }
        }
        config
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some(DEFAULT_ENV_PREFIX.to_string()))
    }
}
