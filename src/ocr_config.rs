//! # OCR Configuration Module
//!
//! This module defines configuration structures for text recognition:
//! page segmentation and engine modes, the ordered recognition profile
//! matrix, and backend settings.

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 10;

/// Page Segmentation Mode for Tesseract OCR
///
/// Only the layouts the recognition matrix tries are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Automatic page segmentation with orientation and script detection
    AutoOsd = 1,
    /// Fully automatic page segmentation, no OSD
    #[default]
    Auto = 3,
    /// Assume a single column of text of variable sizes
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::AutoOsd => "1",
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
        }
    }
}

/// Tesseract OCR engine mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Neural net LSTM engine only
    LstmOnly = 1,
    /// Whatever the installation has available
    #[default]
    Default = 3,
}

impl EngineMode {
    /// Convert OEM value to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::LstmOnly => "1",
            EngineMode::Default => "3",
        }
    }
}

/// One (segmentation mode, engine mode) pair tried by the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecognitionProfile {
    pub psm: PageSegMode,
    pub oem: EngineMode,
}

impl RecognitionProfile {
    pub const fn new(psm: PageSegMode, oem: EngineMode) -> Self {
        Self { psm, oem }
    }

    /// Tesseract command-line style label, e.g. `--psm 4 --oem 1`
    pub fn label(&self) -> String {
        format!("--psm {} --oem {}", self.psm.as_str(), self.oem.as_str())
    }
}

impl std::fmt::Display for RecognitionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Segmentation modes in priority order (outer loop).
pub const SEGMENTATION_PRIORITY: [PageSegMode; 4] = [
    PageSegMode::SingleColumn,
    PageSegMode::SingleBlock,
    PageSegMode::Auto,
    PageSegMode::AutoOsd,
];

/// Engine modes in priority order (inner loop).
pub const ENGINE_PRIORITY: [EngineMode; 2] = [EngineMode::LstmOnly, EngineMode::Default];

/// Full recognition matrix: segmentation mode outer, engine mode inner.
pub const PROFILE_MATRIX: [RecognitionProfile; 8] = [
    RecognitionProfile::new(PageSegMode::SingleColumn, EngineMode::LstmOnly),
    RecognitionProfile::new(PageSegMode::SingleColumn, EngineMode::Default),
    RecognitionProfile::new(PageSegMode::SingleBlock, EngineMode::LstmOnly),
    RecognitionProfile::new(PageSegMode::SingleBlock, EngineMode::Default),
    RecognitionProfile::new(PageSegMode::Auto, EngineMode::LstmOnly),
    RecognitionProfile::new(PageSegMode::Auto, EngineMode::Default),
    RecognitionProfile::new(PageSegMode::AutoOsd, EngineMode::LstmOnly),
    RecognitionProfile::new(PageSegMode::AutoOsd, EngineMode::Default),
];

/// OCR backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "eng", "eng+fra")
    pub languages: String,
    /// Explicit tessdata directory; searched for when unset
    pub tessdata_dir: Option<String>,
    /// Trimmed length a result must exceed to be accepted
    pub min_text_length: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            tessdata_dir: None,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }

        if self
            .languages
            .split('+')
            .any(|lang| lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(AppError::Config(format!(
                "languages must be '+'-separated Tesseract codes, got '{}'",
                self.languages
            )));
        }

        if let Some(dir) = &self.tessdata_dir {
            if dir.trim().is_empty() {
                return Err(AppError::Config(
                    "tessdata_dir cannot be an empty path".to_string(),
                ));
            }
        }

        if self.min_text_length > 1000 {
            return Err(AppError::Config(format!(
                "min_text_length ({}) is unreasonably large",
                self.min_text_length
            )));
        }

        Ok(())
    }
}
