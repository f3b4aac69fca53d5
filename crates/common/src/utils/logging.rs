use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to include target/module
    #[serde(default = "default_include_target")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            include_target: default_include_target(),
        }
    }
}

// Default values
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }
fn default_include_target() -> bool { false }

/// Log format types
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialize logging system
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = build_env_filter(config)?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(config.include_target);

    match LogFormat::from(config.format.as_str()) {
        LogFormat::Json => subscriber.json().try_init()?,
        LogFormat::Pretty => subscriber.pretty().try_init()?,
        LogFormat::Compact => subscriber.compact().try_init()?,
    }

    tracing::debug!("Logging system initialized with level: {}", config.level);
    Ok(())
}

/// Build environment filter from configuration
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    let mut filter_string = config.level.clone();

    // Add RUST_LOG environment variable if present
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            filter_string.push(',');
            filter_string.push_str(&rust_log);
        }
    }

    Ok(EnvFilter::try_new(filter_string)?)
}

/// Initialize logging for testing. Safe to call from several tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "compact");
        assert!(!config.include_target);
    }

    #[test]
    fn test_log_format_conversion() {
        assert_eq!(LogFormat::from("json"), LogFormat::Json);
        assert_eq!(LogFormat::from("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from("invalid"), LogFormat::Compact); // default
    }

    #[test]
    fn test_env_filter_building() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            ..Default::default()
        };
        let filter = build_env_filter(&config).unwrap();
        assert!(filter.to_string().contains("debug"));
    }

    #[test]
    fn test_config_deserialize_with_defaults() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level":"warn"}"#).unwrap();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, "compact");
    }
}
