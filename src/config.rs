//! # Unified Application Configuration
//!
//! This module consolidates all settings into a single configuration object
//! loaded from environment variables, with defaults for everything and a
//! `validate()` pass per section.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use crate::preprocessing::PreprocessingConfig;
use crate::vocabulary::DEFAULT_VOCABULARY_PATH;

/// Entity extraction configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Medical vocabulary JSON file, created with defaults when missing
    pub vocabulary_path: String,
    /// Optional named-entity lexicon JSON file
    pub lexicon_path: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            vocabulary_path: DEFAULT_VOCABULARY_PATH.to_string(),
            lexicon_path: None,
        }
    }
}

impl ExtractionConfig {
    /// Validate extraction configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.vocabulary_path.trim().is_empty() {
            return Err(AppError::Config(
                "Vocabulary path cannot be empty".to_string(),
            ));
        }
        if let Some(path) = &self.lexicon_path {
            if path.trim().is_empty() {
                return Err(AppError::Config(
                    "Entity lexicon path cannot be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// OCR processing configuration
    pub ocr: OcrConfig,
    /// Image conditioning configuration
    pub preprocessing: PreprocessingConfig,
    /// Entity extraction configuration
    pub extraction: ExtractionConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// Reads `key`, falling back to `default` when unset.
fn parse_env<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number, got '{}'", key, value))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // OCR
        if let Ok(languages) = env::var("OCR_LANGUAGES") {
            config.ocr.languages = languages;
        }
        config.ocr.tessdata_dir = env::var("TESSDATA_PREFIX").ok().filter(|p| !p.trim().is_empty());
        config.ocr.min_text_length = parse_env("OCR_MIN_TEXT_LENGTH", config.ocr.min_text_length)?;

        // Preprocessing
        let pre = &mut config.preprocessing;
        pre.block_radius = parse_env("ADAPTIVE_BLOCK_RADIUS", pre.block_radius)?;
        pre.bilateral_window = parse_env("BILATERAL_WINDOW", pre.bilateral_window)?;
        pre.bilateral_sigma_color = parse_env("BILATERAL_SIGMA_COLOR", pre.bilateral_sigma_color)?;
        pre.bilateral_sigma_spatial = parse_env("BILATERAL_SIGMA_SPATIAL", pre.bilateral_sigma_spatial)?;
        pre.clahe_clip_limit = parse_env("CLAHE_CLIP_LIMIT", pre.clahe_clip_limit)?;
        pre.clahe_grid = parse_env("CLAHE_GRID", pre.clahe_grid)?;

        // Extraction
        if let Ok(path) = env::var("MEDICAL_TERMS_PATH") {
            config.extraction.vocabulary_path = path;
        }
        config.extraction.lexicon_path = env::var("ENTITY_LEXICON_PATH").ok();

        // Observability
        config.observability = ObservabilityConfig::from_env()?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.ocr.validate()?;
        self.preprocessing.validate()?;
        self.extraction.validate()?;
        self.observability.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: ocr_languages={}, tessdata_dir={}, min_text_length={}, vocabulary={}, lexicon={}, log_level={}",
            self.ocr.languages,
            self.ocr.tessdata_dir.as_deref().unwrap_or("auto"),
            self.ocr.min_text_length,
            self.extraction.vocabulary_path,
            self.extraction.lexicon_path.as_deref().unwrap_or("none"),
            self.observability.log_level
        )
    }
}
