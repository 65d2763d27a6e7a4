//! # Application Error Types
//!
//! This module defines the configuration-level error type shared by the
//! vocabulary loader, the configuration layer and the command-line front-end,
//! plus structured logging helpers used across the ingestion pipeline.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Vocabulary file could not be parsed or written
    Vocabulary(String),
    /// File system errors
    FileSystem(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Vocabulary(msg) => write!(f, "[VOCABULARY] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Vocabulary(err.to_string())
    }
}

impl From<crate::extraction::ExtractionError> for AppError {
    fn from(err: crate::extraction::ExtractionError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use tracing::error;

    /// Log OCR processing errors with image and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        profile: Option<&str>,
        image_dimensions: Option<(u32, u32)>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            profile = ?profile,
            image_dimensions = ?image_dimensions,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log image conditioning errors with the size of the offending buffer
    pub fn log_preprocessing_error(
        error: &impl std::fmt::Display,
        operation: &str,
        byte_len: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            byte_len = ?byte_len,
            "Image conditioning failed"
        );
    }

    /// Log entity extraction errors with document context
    pub fn log_extraction_error(
        error: &impl std::fmt::Display,
        document_type: &str,
        text_length: usize,
    ) {
        error!(
            error = %error,
            document_type = %document_type,
            text_length = text_length,
            "Entity extraction failed, degrading to raw text"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
