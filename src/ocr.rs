//! # Text Recognition Module
//!
//! Runs a conditioned image through a recognition backend under an ordered
//! matrix of configuration profiles and keeps the first acceptable output.
//!
//! ## Attempt order
//!
//! Segmentation mode is the outer loop and engine mode the inner loop (see
//! [`PROFILE_MATRIX`]). The first attempt whose output passes
//! [`is_acceptable`] wins. When no profile succeeds, one more attempt runs with
//! the backend's own defaults, and when that produces nothing either the
//! engine returns [`SENTINEL_TEXT`].
//!
//! ## Failure policy
//!
//! A failed attempt is logged and skipped. The engine only returns an error
//! when not a single attempt reached the backend, which means the OCR
//! installation itself is unusable.

use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GrayImage, ImageFormat};
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::errors::error_logging;
use crate::instance_manager::OcrInstanceManager;
use crate::ocr_config::{OcrConfig, RecognitionProfile, PROFILE_MATRIX};
use crate::ocr_errors::OcrError;
use crate::preprocessing::ConditionedImage;

/// Text returned when no recognition attempt produced anything usable.
pub const SENTINEL_TEXT: &str = "No text could be extracted from the image.";

/// Label reported for output produced under backend defaults.
pub const DEFAULT_PROFILE_LABEL: &str = "default";

/// A text recognition backend.
///
/// `profile` is `None` for the unconfigured attempt that uses the backend's own
/// defaults. Implementations must be shareable across pipeline invocations.
pub trait RecognitionBackend: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &GrayImage, profile: Option<RecognitionProfile>) -> Result<String, OcrError>;
}

/// Recognized text plus the profile that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedText {
    pub text: String,
    /// `None` when no profile passed the acceptance check
    #[serde(serialize_with = "serialize_profile")]
    pub profile: Option<RecognitionProfile>,
}

impl RecognizedText {
    pub fn sentinel() -> Self {
        Self {
            text: SENTINEL_TEXT.to_string(),
            profile: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.profile.is_none() && self.text == SENTINEL_TEXT
    }

    pub fn profile_label(&self) -> String {
        self.profile
            .map(|p| p.label())
            .unwrap_or_else(|| DEFAULT_PROFILE_LABEL.to_string())
    }
}

fn serialize_profile<S: Serializer>(profile: &Option<RecognitionProfile>, serializer: S) -> Result<S::Ok, S::Error> {
    match profile {
        Some(p) => serializer.serialize_str(&p.label()),
        None => serializer.serialize_str(DEFAULT_PROFILE_LABEL),
    }
}

/// Acceptance check for one attempt's output.
///
/// True iff the text is non-empty, not all whitespace, and its trimmed length
/// is strictly greater than `min_length` characters.
///
/// # Examples
///
/// ```
/// use medical_ingest::ocr::is_acceptable;
///
/// assert!(is_acceptable("Patient: John Smith", 10));
/// assert!(!is_acceptable("   \n\t ", 10));
/// assert!(!is_acceptable("0123456789", 10));
/// ```
pub fn is_acceptable(text: &str, min_length: usize) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.chars().count() > min_length
}

/// Trims every line and drops blank ones.
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Tesseract backend over a pool of reusable instances.
pub struct TesseractBackend {
    instances: OcrInstanceManager,
}

impl TesseractBackend {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            instances: OcrInstanceManager::new(config),
        }
    }
}

impl RecognitionBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, profile: Option<RecognitionProfile>) -> Result<String, OcrError> {
        let instance = self.instances.get_instance(profile.map(|p| p.oem))?;

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::ImageLoad(format!("Failed to encode image for OCR: {e}")))?;

        let pix = leptess::leptonica::pix_read_mem(&png)
            .map_err(|e| OcrError::ImageLoad(format!("Failed to load image for OCR: {:?}", e)))?;

        let mut tess = instance.lock();

        if let Some(profile) = profile {
            // Engine mode was fixed when the pooled instance was initialized.
            let psm = CString::new(profile.psm.as_str())
                .map_err(|e| OcrError::Configuration(format!("Invalid PSM value: {}", e)))?;
            tess.raw
                .set_variable(c"tessedit_pageseg_mode", &psm)
                .map_err(|e| OcrError::Configuration(format!("Failed to set PSM mode: {:?}", e)))?;
        }

        tess.set_image(&pix);

        let text = tess
            .get_utf8_text()
            .map_err(|e| OcrError::Extraction(format!("Failed to extract text from image: {e}")))?;

        Ok(clean_text(&text))
    }
}

/// Ordered-trial recognition engine.
#[derive(Clone)]
pub struct RecognitionEngine {
    backend: Arc<dyn RecognitionBackend>,
    min_text_length: usize,
}

impl RecognitionEngine {
    pub fn new(backend: Arc<dyn RecognitionBackend>, min_text_length: usize) -> Self {
        Self {
            backend,
            min_text_length,
        }
    }

    /// Builds an engine over a Tesseract backend.
    pub fn tesseract(config: OcrConfig) -> Self {
        let min_text_length = config.min_text_length;
        Self::new(Arc::new(TesseractBackend::new(config)), min_text_length)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Recognizes text in a conditioned image.
    ///
    /// # Errors
    ///
    /// Returns `OcrError::Initialization` only when every attempt, including
    /// the unconfigured one, failed to reach the backend.
    pub fn recognize(&self, image: &ConditionedImage) -> Result<RecognizedText, OcrError> {
        let start_time = Instant::now();
        let dimensions = image.dimensions();
        let mut reached_backend = false;
        let mut environment_error = None;

        for profile in PROFILE_MATRIX {
            let attempt_start = Instant::now();
            match self.backend.recognize(&image.image, Some(profile)) {
                Ok(text) => {
                    reached_backend = true;
                    let accepted = is_acceptable(&text, self.min_text_length);
                    crate::observability::record_recognition_attempt(&profile.label(), accepted, attempt_start.elapsed());
                    if accepted {
                        debug!(profile = %profile, chars = text.len(), "Recognition profile accepted");
                        info!(
                            "OCR completed in {}ms with profile {}",
                            start_time.elapsed().as_millis(),
                            profile
                        );
                        return Ok(RecognizedText {
                            text,
                            profile: Some(profile),
                        });
                    }
                    debug!(profile = %profile, chars = text.trim().len(), "Recognition output below threshold");
                }
                Err(e) => {
                    crate::observability::record_recognition_attempt(&profile.label(), false, attempt_start.elapsed());
                    error_logging::log_ocr_error(
                        &e,
                        "recognize_profile",
                        Some(&profile.label()),
                        Some(dimensions),
                        Some(attempt_start.elapsed()),
                    );
                    if e.is_environmental() {
                        environment_error = Some(e);
                    } else {
                        reached_backend = true;
                    }
                }
            }
        }

        warn!("All configured OCR attempts failed, trying default settings");
        let attempt_start = Instant::now();
        match self.backend.recognize(&image.image, None) {
            Ok(text) => {
                reached_backend = true;
                let usable = !text.trim().is_empty();
                crate::observability::record_recognition_attempt(DEFAULT_PROFILE_LABEL, usable, attempt_start.elapsed());
                if usable {
                    return Ok(RecognizedText { text, profile: None });
                }
            }
            Err(e) => {
                crate::observability::record_recognition_attempt(DEFAULT_PROFILE_LABEL, false, attempt_start.elapsed());
                error_logging::log_ocr_error(
                    &e,
                    "recognize_default",
                    None,
                    Some(dimensions),
                    Some(attempt_start.elapsed()),
                );
                if e.is_environmental() {
                    environment_error = Some(e);
                } else {
                    reached_backend = true;
                }
            }
        }

        if !reached_backend {
            return Err(environment_error.unwrap_or_else(|| {
                OcrError::Initialization(format!("backend '{}' could not be invoked", self.backend.name()))
            }));
        }

        crate::observability::record_sentinel_fallback();
        warn!(
            "No OCR attempt produced usable text after {}ms, returning sentinel",
            start_time.elapsed().as_millis()
        );
        Ok(RecognizedText::sentinel())
    }
}
