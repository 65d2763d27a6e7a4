//! # OCR Error Types Module
//!
//! Errors raised by a recognition backend for a single attempt. The
//! recognition engine decides which of these are skippable and which mean the
//! backend cannot be reached at all.

/// Custom error types for OCR operations
#[derive(Debug, Clone)]
pub enum OcrError {
    /// OCR engine initialization errors (missing tessdata, broken installation)
    Initialization(String),
    /// Engine configuration errors (variable rejected by the backend)
    Configuration(String),
    /// Image could not be handed to the backend
    ImageLoad(String),
    /// Text extraction errors
    Extraction(String),
}

impl OcrError {
    /// True when the backend itself could not be brought up.
    pub fn is_environmental(&self) -> bool {
        matches!(self, OcrError::Initialization(_))
    }
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Initialization(msg) => write!(f, "[OCR_INIT] OCR engine initialization failed: {}", msg),
            OcrError::Configuration(msg) => write!(f, "[OCR_CONFIG] OCR engine configuration rejected: {}", msg),
            OcrError::ImageLoad(msg) => write!(f, "[IMAGE_LOAD] Failed to load image for OCR processing: {}", msg),
            OcrError::Extraction(msg) => write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}
