//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for the `gss` tool)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GssError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Ticket mechanism configuration
    #[serde(default)]
    pub krb5: Krb5Config,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| GssError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| GssError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("GSS_KRB5_CLOCK_SKEW") {
            if let Ok(val) = val.parse() {
                self.krb5.clock_skew_secs = val;
            }
        }
        if let Ok(val) = std::env::var("GSS_KRB5_LIFETIME") {
            if let Ok(val) = val.parse() {
                self.krb5.default_lifetime_secs = val;
            }
        }
        if let Ok(level) = std::env::var("GSS_LOG") {
            self.logging.level = level;
        }

        self
    }

    /// Default config file location, `<config dir>/gss/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gss").join("config.toml"))
    }
}

/// How a context picks the first sequence number it sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialSequence {
    /// Random 32-bit value from the crypto provider
    #[default]
    Random,
    /// Always zero, for reproducible traces
    Zero,
}

/// Ticket mechanism configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Krb5Config {
    /// Accepted difference between peer clocks, in seconds
    pub clock_skew_secs: u64,

    /// Lifetime granted when an initiator requests none, in seconds
    pub default_lifetime_secs: u64,

    /// Initial sequence number policy
    pub initial_sequence: InitialSequence,
}

impl Default for Krb5Config {
    fn default() -> Self {
        Self {
            clock_skew_secs: 300, // 5 minutes
            default_lifetime_secs: 36_000, // 10 hours
            initial_sequence: InitialSequence::Random,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `gss=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.krb5.clock_skew_secs, 300);
        assert_eq!(config.krb5.initial_sequence, InitialSequence::Random);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [krb5]
            clock_skew_secs = 60
            initial_sequence = "zero"

            [logging]
            level = "gss=debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.krb5.clock_skew_secs, 60);
        assert_eq!(config.krb5.default_lifetime_secs, 36_000);
        assert_eq!(config.krb5.initial_sequence, InitialSequence::Zero);
        assert_eq!(config.logging.level, "gss=debug");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[krb5]\ndefault_lifetime_secs = 120").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.krb5.default_lifetime_secs, 120);
        assert_eq!(config.krb5.clock_skew_secs, 300);
    }

    #[test]
    fn test_config_errors() {
        let err = Config::from_file("/nonexistent/gss/config.toml").unwrap_err();
        assert!(matches!(err, GssError::Config(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[krb5]\ninitial_sequence = \"sometimes\"").unwrap();
        assert!(matches!(Config::from_file(file.path()), Err(GssError::Config(_))));
    }
}
