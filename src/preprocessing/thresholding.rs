//! # Image Thresholding Module
//!
//! Local adaptive binarization for OCR preprocessing. Each pixel is compared
//! against a Gaussian-weighted mean of its own neighbourhood instead of a
//! single page-wide cutoff, which keeps text legible under uneven lighting.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use tracing;

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Default neighbourhood radius (an 11x11 block).
pub const DEFAULT_BLOCK_RADIUS: u32 = 5;

/// Default constant subtracted from the local mean.
pub const DEFAULT_THRESHOLD_OFFSET: i16 = 2;

/// Applies Gaussian adaptive thresholding to a grayscale image.
///
/// The local threshold at each pixel is the Gaussian-weighted mean of the
/// `(2 * block_radius + 1)` square around it, minus `offset`. Pixels brighter
/// than their local threshold become white (255), everything else black (0).
///
/// The Gaussian sigma is derived from the block size the same way common
/// vision libraries do (`0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`), so an 11x11
/// block uses sigma 2.0.
///
/// # Arguments
///
/// * `image` - Grayscale input
/// * `block_radius` - Neighbourhood radius, must be at least 1
/// * `offset` - Constant subtracted from the local mean
///
/// # Errors
///
/// Returns `PreprocessingError::InvalidParameter` for a zero radius and
/// `PreprocessingError::ProcessingFailed` for an empty image.
///
/// # Examples
///
/// ```
/// use image::GrayImage;
/// use medical_ingest::preprocessing::apply_adaptive_threshold;
///
/// let img = GrayImage::from_pixel(32, 32, image::Luma([200]));
/// let result = apply_adaptive_threshold(&img, 5, 2).unwrap();
/// assert_eq!(result.image.dimensions(), (32, 32));
/// ```
pub fn apply_adaptive_threshold(
    image: &GrayImage,
    block_radius: u32,
    offset: i16,
) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if block_radius == 0 {
        return Err(PreprocessingError::InvalidParameter {
            message: "adaptive threshold block radius must be at least 1".to_string(),
        });
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: format!("cannot threshold an empty {}x{} image", width, height),
        });
    }

    let sigma = gaussian_sigma_for_block(block_radius);
    let local_mean = gaussian_blur_f32(image, sigma);

    let mut binary = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let threshold = i16::from(local_mean.get_pixel(x, y)[0]) - offset;
        let value = if i16::from(pixel[0]) > threshold { 255u8 } else { 0u8 };
        binary.put_pixel(x, y, Luma([value]));
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Adaptive thresholding completed in {}ms: block_radius={}, sigma={:.2}, dimensions={}x{}",
        processing_time.as_millis(),
        block_radius,
        sigma,
        width,
        height
    );

    Ok(ThresholdedImageResult {
        image: binary,
        block_radius,
        offset,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

fn gaussian_sigma_for_block(block_radius: u32) -> f32 {
    let ksize = (2 * block_radius + 1) as f32;
    (0.3 * ((ksize - 1.0) * 0.5 - 1.0) + 0.8).max(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigma_for_eleven_block() {
        assert!((gaussian_sigma_for_block(5) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_sigma_never_degenerate() {
        assert!(gaussian_sigma_for_block(1) >= 0.5);
    }

    #[test]
    fn test_output_is_binary_and_same_size() {
        let mut img = GrayImage::new(40, 30);
        for (x, y, p) in img.enumerate_pixels_mut() {
            p[0] = ((x * 6 + y * 3) % 256) as u8;
        }

        let result = apply_adaptive_threshold(&img, 5, 2)
            .expect("thresholding a gradient should succeed");

        assert_eq!(result.image.dimensions(), (40, 30));
        assert!(result.image.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(result.block_radius, 5);
        assert_eq!(result.offset, 2);
    }

    #[test]
    fn test_uniform_page_turns_white() {
        // A flat page sits above (mean - offset) everywhere.
        let img = GrayImage::from_pixel(25, 25, Luma([180]));
        let result = apply_adaptive_threshold(&img, 5, 2).unwrap();
        assert!(result.image.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_dark_stroke_on_uneven_background_survives() {
        // Left half lit at 220, right half at 120, with a dark stroke in each half.
        let mut img = GrayImage::new(60, 20);
        for (x, _y, p) in img.enumerate_pixels_mut() {
            p[0] = if x < 30 { 220 } else { 120 };
        }
        for y in 5..15 {
            img.put_pixel(15, y, Luma([140]));
            img.put_pixel(45, y, Luma([40]));
        }

        let result = apply_adaptive_threshold(&img, 5, 2).unwrap();

        assert_eq!(result.image.get_pixel(15, 10)[0], 0);
        assert_eq!(result.image.get_pixel(45, 10)[0], 0);
        assert_eq!(result.image.get_pixel(5, 10)[0], 255);
        assert_eq!(result.image.get_pixel(55, 10)[0], 255);
    }

    #[test]
    fn test_zero_radius_rejected() {
        let img = GrayImage::new(10, 10);
        assert!(matches!(
            apply_adaptive_threshold(&img, 0, 2),
            Err(PreprocessingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            apply_adaptive_threshold(&img, 5, 2),
            Err(PreprocessingError::ProcessingFailed { .. })
        ));
    }
}
