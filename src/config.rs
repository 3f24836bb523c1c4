//! # Configuration Management
//!
//! Centralized configuration for the buffer pools, serializer limits, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `WIRE_FORMATTER_*` variables
//!
//! ## Safety Considerations
//! - `max_depth` bounds recursion on adversarial nested input
//! - `max_collection_len` bounds the element count accepted from a header before any
//!   allocation happens

use crate::error::{FormatterError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

use crate::buffer::block_pool::{
    DEFAULT_MAX_BLOCK_SIZE, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_RETAINED_PER_CLASS,
};
use crate::buffer::reader_pool::DEFAULT_RETAINED_READERS;
use crate::buffer::sequence_pool::DEFAULT_RETAINED_BUFFERS;
use crate::options::{SerializerOptions, DEFAULT_MAX_COLLECTION_LEN, DEFAULT_MAX_DEPTH};

/// Largest block size accepted by validation (64MB)
pub const MAX_BLOCK_SIZE_LIMIT: usize = 64 * 1024 * 1024;

/// Deepest nesting accepted by validation
pub const MAX_DEPTH_LIMIT: u32 = 1024;

/// Default size hint for buffers rented by the serializer
pub const DEFAULT_INITIAL_BUFFER_HINT: usize = 256;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FormatterConfig {
    /// Block, buffer and reader pool sizing
    #[serde(default)]
    pub pool: PoolConfig,

    /// Serialization limits
    #[serde(default)]
    pub serializer: SerializerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FormatterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| FormatterError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            FormatterError::ConfigError(format!("Failed to read config file: {e}"))
        })?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| FormatterError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = env_parse::<usize>("WIRE_FORMATTER_MIN_BLOCK_SIZE") {
            config.pool.min_block_size = val;
        }

        if let Some(val) = env_parse::<usize>("WIRE_FORMATTER_MAX_BLOCK_SIZE") {
            config.pool.max_block_size = val;
        }

        if let Some(val) = env_parse::<usize>("WIRE_FORMATTER_MAX_RETAINED_BUFFERS") {
            config.pool.max_retained_buffers = val;
        }

        if let Some(val) = env_parse::<u32>("WIRE_FORMATTER_MAX_DEPTH") {
            config.serializer.max_depth = val;
        }

        if let Some(val) = env_parse::<usize>("WIRE_FORMATTER_MAX_COLLECTION_LEN") {
            config.serializer.max_collection_len = val;
        }

        if let Ok(level) = std::env::var("WIRE_FORMATTER_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                FormatterError::ConfigError(format!("Invalid log level: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            FormatterError::ConfigError(format!("Failed to serialize config: {e}"))
        })?;

        std::fs::write(path, content).map_err(|e| {
            FormatterError::ConfigError(format!("Failed to write config file: {e}"))
        })?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.pool.validate());
        errors.extend(self.serializer.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormatterError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

/// Pool sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Smallest block size class in bytes (power of two)
    pub min_block_size: usize,

    /// Largest pooled block size class in bytes (power of two)
    pub max_block_size: usize,

    /// Idle blocks kept per size class
    pub max_retained_blocks_per_class: usize,

    /// Idle sequence buffer shells kept by the buffer pool
    pub max_retained_buffers: usize,

    /// Idle reader shells kept by the reader pool
    pub max_retained_readers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            max_retained_blocks_per_class: DEFAULT_RETAINED_PER_CLASS,
            max_retained_buffers: DEFAULT_RETAINED_BUFFERS,
            max_retained_readers: DEFAULT_RETAINED_READERS,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.min_block_size == 0 || !self.min_block_size.is_power_of_two() {
            errors.push(format!(
                "min_block_size must be a non-zero power of two, got {}",
                self.min_block_size
            ));
        }

        if !self.max_block_size.is_power_of_two() {
            errors.push(format!(
                "max_block_size must be a power of two, got {}",
                self.max_block_size
            ));
        } else if self.max_block_size > MAX_BLOCK_SIZE_LIMIT {
            errors.push(format!(
                "max_block_size too large: {} bytes (maximum: {} bytes)",
                self.max_block_size, MAX_BLOCK_SIZE_LIMIT
            ));
        }

        if self.max_block_size < self.min_block_size {
            errors.push(format!(
                "max_block_size ({}) must not be smaller than min_block_size ({})",
                self.max_block_size, self.min_block_size
            ));
        }

        if self.max_retained_blocks_per_class == 0 {
            errors.push("max_retained_blocks_per_class must be greater than 0".to_string());
        }

        errors
    }
}

/// Serialization limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerializerConfig {
    /// Deepest nesting accepted while reading or writing
    pub max_depth: u32,

    /// Largest element count accepted from a collection header
    pub max_collection_len: usize,

    /// Size hint for buffers rented when the value length is unknown
    pub initial_buffer_hint: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            initial_buffer_hint: DEFAULT_INITIAL_BUFFER_HINT,
        }
    }
}

impl SerializerConfig {
    /// Validate serializer limits
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_depth == 0 {
            errors.push("max_depth must be greater than 0".to_string());
        } else if self.max_depth > MAX_DEPTH_LIMIT {
            errors.push(format!(
                "max_depth too large: {} (maximum: {MAX_DEPTH_LIMIT})",
                self.max_depth
            ));
        }

        if self.max_collection_len == 0 {
            errors.push("max_collection_len must be greater than 0".to_string());
        }

        errors
    }

    /// Options matching these limits, without a cancellation token.
    pub fn options(&self) -> SerializerOptions {
        SerializerOptions::default()
            .with_max_depth(self.max_depth)
            .with_max_collection_len(self.max_collection_len)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("wire-formatter"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FormatterConfig::default().validate().is_empty());
    }

    #[test]
    fn test_example_config_round_trips() {
        let example = FormatterConfig::example_config();
        let parsed = FormatterConfig::from_toml(&example).unwrap();
        assert_eq!(parsed.pool.min_block_size, DEFAULT_MIN_BLOCK_SIZE);
        assert_eq!(parsed.serializer.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(parsed.logging.log_level, Level::INFO);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FormatterConfig::from_toml(
            r#"
            [serializer]
            max_depth = 8
            max_collection_len = 100
            initial_buffer_hint = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.serializer.max_depth, 8);
        assert_eq!(config.pool.max_block_size, DEFAULT_MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_non_power_of_two_block_size_rejected() {
        let config = FormatterConfig::default_with_overrides(|c| {
            c.pool.min_block_size = 1000;
        });
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("min_block_size")));
        assert!(config.validate_strict().is_err());
    }
}
