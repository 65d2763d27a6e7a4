//! # Image Preprocessing Module
//!
//! Conditions scanned or photographed document images for text recognition.
//!
//! The module is organized into focused sub-modules:
//! - `thresholding`: Local adaptive binarization
//! - `filtering`: Bilateral smoothing, CLAHE and dilation
//! - `conditioner`: The decode / condition / fallback chain
//! - `types`: Shared types and error definitions

pub mod conditioner;
pub mod filtering;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    ClaheImageResult, ConditionedImage, ConditioningPath, DenoisedImageResult, DilatedImageResult,
    PreprocessingError, ThresholdedImageResult,
};

pub use conditioner::{ImageConditioner, PreprocessingConfig};
pub use filtering::{apply_bilateral_filter, apply_clahe, apply_dilation};
pub use thresholding::apply_adaptive_threshold;
