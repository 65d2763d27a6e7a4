//! # Observability Configuration
//!
//! Log level and output format for the tracing subscriber.

use std::env;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line human readable output
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Observability configuration for different environments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for this crate's targets
    pub log_level: String,
    /// Output format
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(environment) = env::var("ENVIRONMENT") {
            config.environment = environment;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.log_level = level.trim().to_ascii_lowercase();
        }
        match env::var("LOG_FORMAT") {
            Ok(format) => {
                config.log_format = LogFormat::parse(&format).ok_or_else(|| {
                    AppError::Config(format!("LOG_FORMAT must be 'json' or 'pretty', got '{}'", format))
                })?;
            }
            Err(_) if config.is_development() => config.log_format = LogFormat::Pretty,
            Err(_) => {}
        }

        Ok(config)
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.environment.trim().is_empty() {
            return Err(AppError::Config("environment cannot be empty".to_string()));
        }
        if !VALID_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log level '{}', expected one of {:?}",
                self.log_level, VALID_LEVELS
            )));
        }
        Ok(())
    }
}
