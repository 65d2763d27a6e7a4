//! # Image Conditioner
//!
//! Turns raw document bytes into a single-channel image ready for recognition.
//!
//! The normal path decodes the bytes, converts to grayscale, binarizes with a
//! local adaptive threshold, smooths the binary image with a bilateral filter
//! and thickens strokes with a 2x2 dilation. Any failure after a successful
//! decode drops to the fallback path, which hands the plain decoded image to
//! recognition unmodified. Only bytes that no decode path understands are an
//! error.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::pipeline::RawImage;

use super::filtering::{apply_bilateral_filter, apply_clahe, apply_dilation};
use super::thresholding::{apply_adaptive_threshold, DEFAULT_BLOCK_RADIUS, DEFAULT_THRESHOLD_OFFSET};
use super::types::{ConditionedImage, ConditioningPath, PreprocessingError};

/// Tunables for the normal conditioning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Adaptive threshold neighbourhood radius (5 => 11x11 block)
    pub block_radius: u32,
    /// Constant subtracted from the local mean
    pub threshold_offset: i16,
    /// Bilateral filter window diameter in pixels (odd)
    pub bilateral_window: u32,
    /// Bilateral intensity sigma
    pub bilateral_sigma_color: f32,
    /// Bilateral spatial sigma
    pub bilateral_sigma_spatial: f32,
    /// CLAHE clip limit
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per axis
    pub clahe_grid: u32,
    /// Dilation element side length (2 => 2x2)
    pub dilation_size: u8,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            block_radius: DEFAULT_BLOCK_RADIUS,
            threshold_offset: DEFAULT_THRESHOLD_OFFSET,
            bilateral_window: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_spatial: 75.0,
            clahe_clip_limit: 2.0,
            clahe_grid: 8,
            dilation_size: 2,
        }
    }
}

impl PreprocessingConfig {
    /// Validate preprocessing configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.block_radius == 0 || self.block_radius > 50 {
            return Err(AppError::Config(format!(
                "Adaptive block radius must be between 1 and 50, got {}",
                self.block_radius
            )));
        }
        if self.bilateral_window < 3 || self.bilateral_window % 2 == 0 {
            return Err(AppError::Config(format!(
                "Bilateral window must be an odd number >= 3, got {}",
                self.bilateral_window
            )));
        }
        if self.bilateral_sigma_color <= 0.0 || self.bilateral_sigma_spatial <= 0.0 {
            return Err(AppError::Config(
                "Bilateral sigmas must be positive".to_string(),
            ));
        }
        if self.clahe_clip_limit <= 0.0 {
            return Err(AppError::Config(
                "CLAHE clip limit must be positive".to_string(),
            ));
        }
        if self.clahe_grid == 0 {
            return Err(AppError::Config("CLAHE grid cannot be 0".to_string()));
        }
        if self.dilation_size == 0 || self.dilation_size > 15 {
            return Err(AppError::Config(format!(
                "Dilation element size must be between 1 and 15, got {}",
                self.dilation_size
            )));
        }
        Ok(())
    }

    fn bilateral_radius(&self) -> u32 {
        self.bilateral_window / 2
    }
}

/// Stateless image conditioner. Safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct ImageConditioner {
    config: PreprocessingConfig,
}

impl ImageConditioner {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Conditions a raw image for recognition.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::Decode` only when neither the primary nor the
    /// fallback decode can read the bytes.
    pub fn condition(&self, raw: &RawImage) -> Result<ConditionedImage, PreprocessingError> {
        let start_time = std::time::Instant::now();

        let primary_error = match decode_primary(raw.bytes()) {
            Ok(decoded) => match self.run_normal_path(&decoded) {
                Ok(image) => {
                    tracing::debug!(
                        target: "ocr_preprocessing",
                        "Normal conditioning completed in {}ms: dimensions={}x{}",
                        start_time.elapsed().as_millis(),
                        image.width(),
                        image.height()
                    );
                    crate::observability::record_conditioning_path(ConditioningPath::Normal);
                    return Ok(ConditionedImage {
                        image,
                        path: ConditioningPath::Normal,
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Conditioning chain failed, using fallback decode");
                    e.to_string()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Primary decode failed, trying fallback decode");
                e
            }
        };

        match decode_fallback(raw.bytes(), raw.declared_format()) {
            Ok(decoded) => {
                crate::observability::record_conditioning_path(ConditioningPath::Fallback);
                Ok(ConditionedImage {
                    image: decoded.to_luma8(),
                    path: ConditioningPath::Fallback,
                })
            }
            Err(fallback_error) => {
                let error = PreprocessingError::Decode {
                    message: format!("primary: {}; fallback: {}", primary_error, fallback_error),
                };
                crate::errors::error_logging::log_preprocessing_error(
                    &error,
                    "condition",
                    Some(raw.bytes().len()),
                );
                Err(error)
            }
        }
    }

    fn run_normal_path(&self, decoded: &DynamicImage) -> Result<GrayImage, PreprocessingError> {
        let gray = decoded.to_luma8();

        let binary = apply_adaptive_threshold(
            &gray,
            self.config.block_radius,
            self.config.threshold_offset,
        )?;

        let denoised = apply_bilateral_filter(
            &binary.image,
            self.config.bilateral_radius(),
            self.config.bilateral_sigma_color,
            self.config.bilateral_sigma_spatial,
        )?;

        // Equalized grayscale is not part of the output.
        let grid = (self.config.clahe_grid, self.config.clahe_grid);
        let _equalized = apply_clahe(&gray, self.config.clahe_clip_limit, grid)?;

        let dilated = apply_dilation(&denoised.image, self.config.dilation_size)?;

        Ok(dilated.image)
    }
}

/// Content-sniffed decode under the decoder's default allocation limits.
fn decode_primary(bytes: &[u8]) -> Result<DynamicImage, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?;
    if reader.format().is_none() {
        return Err("unrecognized image format".to_string());
    }
    reader.decode().map_err(|e| e.to_string())
}

/// Plain container decode: trusts the declared format when there is one and
/// lifts the decoder limits.
fn decode_fallback(bytes: &[u8], declared: Option<ImageFormat>) -> Result<DynamicImage, String> {
    let mut reader = ImageReader::new(Cursor::new(bytes));
    match declared {
        Some(format) => reader.set_format(format),
        None => {
            reader = reader.with_guessed_format().map_err(|e| e.to_string())?;
        }
    }
    if reader.format().is_none() {
        return Err("no declared or detectable image format".to_string());
    }
    reader.no_limits();
    reader.decode().map_err(|e| e.to_string())
}
