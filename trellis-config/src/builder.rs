// ConfigBuilder - declare configuration sources, then load them in order

use crate::{ConfigManager, FileFormat, Result, TrellisConfig};

/// Builder for a [`ConfigManager`].
///
/// Sources load in a fixed order regardless of call order: files (in the
/// order added), then `.env`, then the process environment.
pub struct ConfigBuilder {
    prefix: Option<String>,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
    config_files: Vec<(String, Option<FileFormat>)>,
    optional_files: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            prefix: None,
            load_env: false,
            load_dotenv: false,
            dotenv_path: None,
            config_files: Vec::new(),
            optional_files: false,
        }
    }

    /// Set environment variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Enable loading from a .env file (default location when `None`)
    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    /// Add a configuration file with an explicit format
    pub fn add_file(mut self, path: impl Into<String>, format: FileFormat) -> Self {
        self.config_files.push((path.into(), Some(format)));
        self
    }

    /// Add a configuration file whose format follows its extension
    pub fn add_file_auto(mut self, path: impl Into<String>) -> Self {
        self.config_files.push((path.into(), None));
        self
    }

    /// Skip files that do not exist instead of failing
    pub fn optional_files(mut self, optional: bool) -> Self {
        self.optional_files = optional;
        self
    }

    /// Load every declared source
    pub fn build(self) -> Result<ConfigManager> {
        let manager = match self.prefix {
            Some(prefix) => ConfigManager::with_prefix(prefix),
            None => ConfigManager::new(),
        };

        for (path, format) in &self.config_files {
            if self.optional_files && !std::path::Path::new(path).exists() {
                tracing::debug!(path = %path, "optional configuration file missing");
                continue;
            }
            match format {
                Some(format) => manager.load_file(path, *format)?,
                None => manager.load_file_auto(path)?,
            }
        }

        if self.load_dotenv {
            manager.load_dotenv(self.dotenv_path.as_deref())?;
        } else if self.load_env {
            manager.load_env()?;
        }

        Ok(manager)
    }

    /// Load every source and validate the full configuration
    pub fn build_config(self) -> Result<TrellisConfig> {
        self.build()?.load_validated()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;

    fn write_temp(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("trellis-config-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_files_load_in_order() {
        let base = write_temp("base.toml", "[dispatch]\nmax_results_cap = 100\nbase_path = \"/v1/\"\n");
        let local = write_temp("local.json", r#"{"dispatch": {"max_results_cap": 40}}"#);

        let manager = ConfigBuilder::new()
            .add_file_auto(&base)
            .add_file(&local, FileFormat::Json)
            .build()
            .unwrap();

        assert_eq!(manager.get_int("dispatch.max_results_cap").unwrap(), 40);
        assert_eq!(manager.get_string("dispatch.base_path").unwrap(), "/v1/");

        std::fs::remove_file(base).ok();
        std::fs::remove_file(local).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigBuilder::new()
            .add_file("/nonexistent/trellis.toml", FileFormat::Toml)
            .build();
        assert!(matches!(result, Err(ConfigError::LoadError(_))));

        let manager = ConfigBuilder::new()
            .add_file("/nonexistent/trellis.toml", FileFormat::Toml)
            .optional_files(true)
            .build()
            .unwrap();
        assert!(manager.keys().is_empty());
    }

    #[test]
    fn test_build_config_validates() {
        let bad = write_temp("bad.json", r#"{"dispatch": {"base_path": "api"}}"#);
        let result = ConfigBuilder::new().add_file_auto(&bad).build_config();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        std::fs::remove_file(bad).ok();
    }
}
