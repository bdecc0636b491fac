// Configuration validation

use crate::{ConfigError, Result, TrellisConfig};
use trellis_core::config::DispatchConfig;
use trellis_core::logging::{LogConfig, LogOutput};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within an inclusive range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display,
    {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL",
                field
            )));
        }
        Ok(())
    }

    /// Validate an absolute URL path without templates or query
    pub fn is_path(value: &str, field: &str) -> Result<()> {
        if !value.starts_with('/') || value.contains(['{', '}', '?', '#']) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an absolute path, got '{}'",
                field, value
            )));
        }
        Ok(())
    }
}

impl Validate for DispatchConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::in_range(self.max_results_cap, 1, 10_000, "max_results_cap")?;
        ConfigValidator::in_range(
            self.default_max_results,
            1,
            self.max_results_cap,
            "default_max_results",
        )?;
        ConfigValidator::is_path(&self.base_path, "base_path")?;
        if !self.site_url.is_empty() {
            ConfigValidator::is_url(&self.site_url, "site_url")?;
        }
        Ok(())
    }
}

impl Validate for LogConfig {
    fn validate(&self) -> Result<()> {
        self.build_filter()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        match &self.output {
            LogOutput::File { path } => ConfigValidator::not_empty(path, "logging.output.path"),
            LogOutput::RollingFile {
                directory, prefix, ..
            } => {
                ConfigValidator::not_empty(directory, "logging.output.directory")?;
                ConfigValidator::not_empty(prefix, "logging.output.prefix")
            }
            LogOutput::Stdout | LogOutput::Stderr => Ok(()),
        }
    }
}

impl Validate for TrellisConfig {
    fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());
        let err = ConfigValidator::in_range(11, 1, 10, "field").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: field must be between 1 and 10, got 11"
        );
    }

    #[test]
    fn test_default_dispatch_config_is_valid() {
        assert!(DispatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_exceeding_cap_is_invalid() {
        let config = DispatchConfig::default()
            .with_max_results_cap(10)
            .with_default_max_results(25);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_base_path_and_site_url() {
        assert!(DispatchConfig::default().with_base_path("api").validate().is_err());
        assert!(DispatchConfig::default().with_base_path("/{x}/").validate().is_err());
        assert!(DispatchConfig::default().with_site_url("example.com").validate().is_err());
        assert!(
            DispatchConfig::default()
                .with_site_url("https://example.com")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_log_config_validation() {
        assert!(LogConfig::default().validate().is_ok());
        assert!(
            LogConfig::default()
                .output(LogOutput::File {
                    path: String::new()
                })
                .validate()
                .is_err()
        );
    }
}
