//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use tracing::Level;
use wire_formatter::config::{
    FormatterConfig, LoggingConfig, PoolConfig, SerializerConfig, MAX_BLOCK_SIZE_LIMIT,
    MAX_DEPTH_LIMIT,
};
use wire_formatter::{FormatterError, WireSerializer};

#[test]
fn test_default_config_validates() {
    let config = FormatterConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_min_block_size_must_be_power_of_two() {
    let mut config = FormatterConfig::default();
    config.pool.min_block_size = 3000;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("min_block_size")));
}

#[test]
fn test_zero_min_block_size() {
    let pool = PoolConfig {
        min_block_size: 0,
        ..PoolConfig::default()
    };
    assert!(!pool.validate().is_empty());
}

#[test]
fn test_max_block_size_limit() {
    let mut config = FormatterConfig::default();
    config.pool.max_block_size = MAX_BLOCK_SIZE_LIMIT * 2;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("max_block_size too large")));
}

#[test]
fn test_inverted_block_sizes() {
    let mut config = FormatterConfig::default();
    config.pool.min_block_size = 8192;
    config.pool.max_block_size = 4096;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("must not be smaller")));
}

#[test]
fn test_zero_retained_blocks() {
    let mut config = FormatterConfig::default();
    config.pool.max_retained_blocks_per_class = 0;
    assert!(!config.validate().is_empty());
}

#[test]
fn test_depth_limits() {
    let zero = SerializerConfig {
        max_depth: 0,
        ..SerializerConfig::default()
    };
    assert!(zero.validate().iter().any(|e| e.contains("max_depth")));

    let huge = SerializerConfig {
        max_depth: MAX_DEPTH_LIMIT + 1,
        ..SerializerConfig::default()
    };
    assert!(huge.validate().iter().any(|e| e.contains("too large")));
}

#[test]
fn test_zero_collection_len() {
    let config = FormatterConfig::default_with_overrides(|c| c.serializer.max_collection_len = 0);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("max_collection_len")));
}

#[test]
fn test_logging_requires_an_output() {
    let logging = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_file_logging_requires_path() {
    let logging = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_multiple_errors_reported() {
    let mut config = FormatterConfig::default();
    config.pool.min_block_size = 3;
    config.serializer.max_depth = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.len() >= 3, "expected three errors, got {:?}", errors);
}

#[test]
fn test_validate_strict_lists_errors() {
    let config = FormatterConfig::default_with_overrides(|c| c.serializer.max_depth = 0);
    match config.validate_strict() {
        Err(FormatterError::ConfigError(message)) => {
            assert!(message.contains("Configuration validation failed"));
            assert!(message.contains("max_depth"));
        }
        other => panic!("expected a configuration error, got {:?}", other),
    }
}

#[test]
fn test_serializer_from_invalid_config_fails() {
    let config = FormatterConfig::default_with_overrides(|c| c.pool.max_block_size = 1000);
    assert!(WireSerializer::from_config(&config).is_err());
}

#[test]
fn test_toml_overrides() {
    let config = FormatterConfig::from_toml(
        r#"
        [pool]
        min_block_size = 256
        max_block_size = 65536
        max_retained_blocks_per_class = 4
        max_retained_buffers = 2
        max_retained_readers = 2

        [logging]
        app_name = "edge"
        log_level = "debug"
        log_to_console = true
        log_to_file = false
        json_format = true
        "#,
    )
    .expect("valid TOML");

    assert_eq!(config.pool.min_block_size, 256);
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    assert!(config.validate().is_empty());

    let serializer = WireSerializer::from_config(&config).expect("valid config");
    assert_eq!(serializer.buffer_pool().block_pool().min_block_size(), 256);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = FormatterConfig::from_toml("[pool]\nmin_block_size = \"big\"");
    assert!(matches!(result, Err(FormatterError::ConfigError(_))));
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = FormatterConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        log_to_console = true
        log_to_file = false
        json_format = false
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_save_and_load_round_trip() {
    let path = std::env::temp_dir().join(format!(
        "wire-formatter-config-{}.toml",
        std::process::id()
    ));
    let config = FormatterConfig::default_with_overrides(|c| c.serializer.max_depth = 12);
    config.save_to_file(&path).expect("save");

    let loaded = FormatterConfig::from_file(&path).expect("load");
    assert_eq!(loaded.serializer.max_depth, 12);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_missing_file_is_config_error() {
    let result = FormatterConfig::from_file("/nonexistent/wire-formatter.toml");
    assert!(matches!(result, Err(FormatterError::ConfigError(_))));
}
