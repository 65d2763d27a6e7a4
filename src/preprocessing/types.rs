//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use image::GrayImage;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone)]
pub enum PreprocessingError {
    /// Bytes could not be decoded as a raster image by any decode path
    Decode { message: String },
    /// A filter was given a parameter outside its valid range
    InvalidParameter { message: String },
    /// Image processing operation failed
    ProcessingFailed { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::Decode { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            PreprocessingError::InvalidParameter { message } => {
                write!(f, "Invalid preprocessing parameter: {}", message)
            }
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Which conditioning path produced a [`ConditionedImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditioningPath {
    /// Full grayscale, binarize, smooth, dilate chain
    Normal,
    /// Raw decode handed to recognition unmodified
    Fallback,
}

impl ConditioningPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditioningPath::Normal => "normal",
            ConditioningPath::Fallback => "fallback",
        }
    }
}

/// Single-channel image ready for recognition.
///
/// Dimensions always equal those of the decoded source image.
#[derive(Debug, Clone)]
pub struct ConditionedImage {
    /// 8-bit intensity grid
    pub image: GrayImage,
    /// Path that produced this image
    pub path: ConditioningPath,
}

impl ConditionedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_fallback(&self) -> bool {
        self.path == ConditioningPath::Fallback
    }
}

/// Result of local adaptive thresholding.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The binary image (0 or 255 only)
    pub image: GrayImage,
    /// Neighbourhood radius used for the local threshold
    pub block_radius: u32,
    /// Constant subtracted from the local mean
    pub offset: i16,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of edge-preserving noise reduction.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The smoothed image
    pub image: GrayImage,
    /// Spatial window radius in pixels
    pub radius: u32,
    /// Intensity sigma (edge sensitivity)
    pub sigma_color: f32,
    /// Spatial sigma (distance falloff)
    pub sigma_spatial: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological dilation on a binary image.
#[derive(Debug, Clone)]
pub struct DilatedImageResult {
    /// The dilated image
    pub image: GrayImage,
    /// Side length of the square structuring element
    pub size: u8,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of CLAHE contrast enhancement operation.
#[derive(Debug, Clone)]
pub struct ClaheImageResult {
    /// The contrast-enhanced image
    pub image: GrayImage,
    /// Clip limit used for histogram clipping
    pub clip_limit: f32,
    /// Number of tiles along each axis
    pub grid: (u32, u32),
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
