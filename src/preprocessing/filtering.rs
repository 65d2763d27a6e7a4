//! # Image Filtering Module
//!
//! Noise suppression, contrast equalization and morphology for OCR preprocessing:
//! - bilateral smoothing, which removes speckle left by binarization while
//!   keeping character boundaries sharp
//! - tiled contrast-limited histogram equalization (CLAHE) for faint strokes
//! - grayscale dilation with a small square element

use image::{imageops, GrayImage, Luma};
use imageproc::morphology::{self, Mask};
use tracing;

use super::types::{ClaheImageResult, DenoisedImageResult, DilatedImageResult, PreprocessingError};

/// Applies an edge-preserving bilateral filter to a grayscale image.
///
/// Every output pixel is a weighted mean of its `(2 * radius + 1)` square
/// neighbourhood. A neighbour's weight falls off with both its spatial
/// distance (`sigma_spatial`) and its intensity difference from the centre
/// pixel (`sigma_color`), so flat regions are smoothed while strong edges,
/// such as the boundary of a glyph, are left intact.
///
/// # Arguments
///
/// * `image` - The grayscale image to smooth
/// * `radius` - Window radius in pixels (a 9-pixel diameter is radius 4)
/// * `sigma_color` - Intensity sigma, must be > 0
/// * `sigma_spatial` - Distance sigma, must be > 0
///
/// # Examples
///
/// ```
/// use image::GrayImage;
/// use medical_ingest::preprocessing::apply_bilateral_filter;
///
/// let img = GrayImage::from_pixel(16, 16, image::Luma([90]));
/// let smoothed = apply_bilateral_filter(&img, 4, 75.0, 75.0).unwrap();
/// assert_eq!(smoothed.image.get_pixel(8, 8)[0], 90);
/// ```
pub fn apply_bilateral_filter(
    image: &GrayImage,
    radius: u32,
    sigma_color: f32,
    sigma_spatial: f32,
) -> Result<DenoisedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if radius == 0 {
        return Err(PreprocessingError::InvalidParameter {
            message: "bilateral radius must be at least 1".to_string(),
        });
    }
    if sigma_color <= 0.0 || sigma_spatial <= 0.0 {
        return Err(PreprocessingError::InvalidParameter {
            message: format!(
                "bilateral sigmas must be positive (color={}, spatial={})",
                sigma_color, sigma_spatial
            ),
        });
    }

    let (width, height) = image.dimensions();
    let color_denominator = 2.0 * sigma_color * sigma_color;
    let spatial_denominator = 2.0 * sigma_spatial * sigma_spatial;

    // Intensity differences only span 0..=255, so the range kernel is a lookup.
    let range_weights: Vec<f32> = (0..256)
        .map(|d| {
            let d = d as f32;
            (-(d * d) / color_denominator).exp()
        })
        .collect();

    let side = (2 * radius + 1) as usize;
    let mut spatial_weights = Vec::with_capacity(side * side);
    for dy in -(radius as i64)..=(radius as i64) {
        for dx in -(radius as i64)..=(radius as i64) {
            let dist_sq = (dx * dx + dy * dy) as f32;
            spatial_weights.push((-dist_sq / spatial_denominator).exp());
        }
    }

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let center = image.get_pixel(x, y)[0];
            let mut weighted_sum = 0.0f32;
            let mut weight_total = 0.0f32;

            for (row, dy) in (-(radius as i64)..=(radius as i64)).enumerate() {
                let ny = i64::from(y) + dy;
                if ny < 0 || ny >= i64::from(height) {
                    continue;
                }
                for (col, dx) in (-(radius as i64)..=(radius as i64)).enumerate() {
                    let nx = i64::from(x) + dx;
                    if nx < 0 || nx >= i64::from(width) {
                        continue;
                    }
                    let neighbour = image.get_pixel(nx as u32, ny as u32)[0];
                    let weight = spatial_weights[row * side + col]
                        * range_weights[usize::from(center.abs_diff(neighbour))];
                    weighted_sum += f32::from(neighbour) * weight;
                    weight_total += weight;
                }
            }

            let value = if weight_total > 0.0 {
                (weighted_sum / weight_total).round().clamp(0.0, 255.0) as u8
            } else {
                center
            };
            output.put_pixel(x, y, Luma([value]));
        }
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Bilateral filter completed in {}ms: radius={}, sigma_color={:.1}, sigma_spatial={:.1}, dimensions={}x{}",
        processing_time.as_millis(),
        radius,
        sigma_color,
        sigma_spatial,
        width,
        height
    );

    Ok(DenoisedImageResult {
        image: output,
        radius,
        sigma_color,
        sigma_spatial,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Dilates a binarized page with a `size` x `size` square element, one iteration.
///
/// Each output pixel is the maximum over the element anchored at `size / 2`,
/// matching the usual OpenCV anchoring. On dark text over a light page this
/// grows the light side by `size - 1` pixels per stroke, so the default 2x2
/// element keeps a 2 px stroke at 1 px where a 3x3 one would erase it.
pub fn apply_dilation(image: &GrayImage, size: u8) -> Result<DilatedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if size == 0 {
        return Err(PreprocessingError::InvalidParameter {
            message: "dilation element size must be at least 1".to_string(),
        });
    }

    let element = GrayImage::from_pixel(u32::from(size), u32::from(size), Luma([255]));
    let mask = Mask::from_image(&element, size / 2, size / 2);
    let dilated = morphology::grayscale_dilate(image, &mask);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Dilation completed in {}ms: element={}x{}, dimensions={}x{}",
        processing_time.as_millis(),
        size,
        size,
        dilated.width(),
        dilated.height()
    );

    Ok(DilatedImageResult {
        image: dilated,
        size,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Applies Contrast Limited Adaptive Histogram Equalization (CLAHE).
///
/// The image is split into a `grid.0 x grid.1` lattice of tiles and each tile
/// is equalized independently. Histogram bins above
/// `clip_limit * (tile_pixels / 256)` are clipped and the excess spread
/// evenly across all bins, which stops flat paper regions from turning into
/// amplified noise.
///
/// # Arguments
///
/// * `image` - Grayscale input
/// * `clip_limit` - Relative clip limit (2.0 is a common choice)
/// * `grid` - Number of tiles along x and y (8x8 is a common choice)
pub fn apply_clahe(
    image: &GrayImage,
    clip_limit: f32,
    grid: (u32, u32),
) -> Result<ClaheImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if clip_limit <= 0.0 {
        return Err(PreprocessingError::InvalidParameter {
            message: format!("Invalid clip limit: {}. Must be > 0.0", clip_limit),
        });
    }
    if grid.0 == 0 || grid.1 == 0 {
        return Err(PreprocessingError::InvalidParameter {
            message: "Invalid CLAHE grid: tile counts must be > 0".to_string(),
        });
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: format!("cannot equalize an empty {}x{} image", width, height),
        });
    }

    let tile_width = width.div_ceil(grid.0).max(1);
    let tile_height = height.div_ceil(grid.1).max(1);

    let mut output = GrayImage::new(width, height);
    let mut tile_y = 0;
    while tile_y < height {
        let mut tile_x = 0;
        let h = tile_height.min(height - tile_y);
        while tile_x < width {
            let w = tile_width.min(width - tile_x);
            let tile = imageops::crop_imm(image, tile_x, tile_y, w, h).to_image();
            let equalized = equalize_tile(&tile, clip_limit);
            imageops::replace(&mut output, &equalized, i64::from(tile_x), i64::from(tile_y));
            tile_x += tile_width;
        }
        tile_y += tile_height;
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "CLAHE applied in {}ms: clip_limit={}, grid={:?}",
        processing_time.as_millis(),
        clip_limit,
        grid
    );

    Ok(ClaheImageResult {
        image: output,
        clip_limit,
        grid,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Clipped histogram equalization of a single tile.
fn equalize_tile(tile: &GrayImage, clip_limit: f32) -> GrayImage {
    let total_pixels = (tile.width() * tile.height()) as f32;

    let mut histogram = [0u32; 256];
    for pixel in tile.pixels() {
        histogram[usize::from(pixel[0])] += 1;
    }

    let ceiling = ((clip_limit * total_pixels / 256.0).round() as u32).max(1);
    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > ceiling {
            excess += *count - ceiling;
            *count = ceiling;
        }
    }

    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (bin, count) in histogram.iter_mut().enumerate() {
        *count += share + u32::from(bin < remainder);
    }

    let mut lookup = [0u8; 256];
    let mut cumulative = 0u32;
    for (bin, count) in histogram.iter().enumerate() {
        cumulative += count;
        lookup[bin] = ((cumulative as f32 / total_pixels) * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    let mut result = tile.clone();
    for pixel in result.pixels_mut() {
        pixel[0] = lookup[usize::from(pixel[0])];
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speckled(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for (x, y, p) in img.enumerate_pixels_mut() {
            if (x * 7 + y * 13) % 29 == 0 {
                p[0] = 230;
            }
        }
        img
    }

    #[test]
    fn test_bilateral_preserves_flat_image() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        let result = apply_bilateral_filter(&img, 4, 75.0, 75.0).unwrap();
        assert!(result.image.pixels().all(|p| p[0] == 128));
        assert_eq!(result.radius, 4);
    }

    #[test]
    fn test_bilateral_keeps_hard_edge() {
        let mut img = GrayImage::new(20, 10);
        for (x, _y, p) in img.enumerate_pixels_mut() {
            p[0] = if x < 10 { 0 } else { 255 };
        }

        // A small color sigma makes the 255-step edge effectively impassable.
        let result = apply_bilateral_filter(&img, 3, 10.0, 75.0).unwrap();

        assert_eq!(result.image.get_pixel(9, 5)[0], 0);
        assert_eq!(result.image.get_pixel(10, 5)[0], 255);
    }

    #[test]
    fn test_bilateral_softens_faint_speckle() {
        let img = speckled(30, 30);
        let result = apply_bilateral_filter(&img, 4, 75.0, 75.0).unwrap();

        let input_min = img.pixels().map(|p| p[0]).min().unwrap();
        let output_min = result.image.pixels().map(|p| p[0]).min().unwrap();
        assert!(output_min > input_min);
    }

    #[test]
    fn test_bilateral_invalid_parameters() {
        let img = GrayImage::new(8, 8);
        assert!(apply_bilateral_filter(&img, 0, 75.0, 75.0).is_err());
        assert!(apply_bilateral_filter(&img, 4, 0.0, 75.0).is_err());
        assert!(apply_bilateral_filter(&img, 4, 75.0, -1.0).is_err());
    }

    #[test]
    fn test_dilation_grows_light_pixels() {
        let mut img = GrayImage::new(7, 7);
        img.put_pixel(3, 3, Luma([200]));

        let result = apply_dilation(&img, 2).unwrap();

        // Anchor at (1, 1): the bright pixel spreads right and down only.
        for (x, y) in [(3, 3), (4, 3), (3, 4), (4, 4)] {
            assert_eq!(result.image.get_pixel(x, y)[0], 200);
        }
        assert_eq!(result.image.get_pixel(2, 3)[0], 0);
        assert_eq!(result.image.get_pixel(3, 2)[0], 0);
        assert_eq!(result.image.dimensions(), (7, 7));
    }

    #[test]
    fn test_dilation_keeps_two_pixel_stroke() {
        let mut img = GrayImage::from_pixel(12, 12, Luma([255]));
        for x in 0..12 {
            img.put_pixel(x, 5, Luma([0]));
            img.put_pixel(x, 6, Luma([0]));
        }

        let thin = apply_dilation(&img, 2).unwrap();
        let wide = apply_dilation(&img, 3).unwrap();

        assert!((0..12).all(|x| thin.image.get_pixel(x, 6)[0] == 0));
        assert!((0..12).all(|x| thin.image.get_pixel(x, 5)[0] == 255));
        assert!(wide.image.pixels().all(|p| p[0] == 255));
        assert_eq!(thin.size, 2);
    }

    #[test]
    fn test_dilation_zero_size_rejected() {
        let img = GrayImage::new(4, 4);
        assert!(apply_dilation(&img, 0).is_err());
    }

    #[test]
    fn test_clahe_keeps_dimensions() {
        let mut img = GrayImage::new(100, 60);
        for (x, y, p) in img.enumerate_pixels_mut() {
            p[0] = (100 + (x + y) % 20) as u8;
        }

        let result = apply_clahe(&img, 2.0, (8, 8)).unwrap();

        assert_eq!(result.image.dimensions(), (100, 60));
        assert_eq!(result.grid, (8, 8));
        assert_eq!(result.clip_limit, 2.0);
    }

    #[test]
    fn test_clahe_stretches_low_contrast_tile() {
        let mut tile = GrayImage::new(4, 4);
        for (x, y, p) in tile.enumerate_pixels_mut() {
            p[0] = 100 + (x + y) as u8;
        }

        let enhanced = equalize_tile(&tile, 2.0);

        let spread_in = 6u8;
        let max = enhanced.pixels().map(|p| p[0]).max().unwrap();
        let min = enhanced.pixels().map(|p| p[0]).min().unwrap();
        assert!(max - min > spread_in);
    }

    #[test]
    fn test_clahe_grid_larger_than_image() {
        let img = GrayImage::from_pixel(3, 3, Luma([50]));
        let result = apply_clahe(&img, 2.0, (8, 8)).unwrap();
        assert_eq!(result.image.dimensions(), (3, 3));
    }

    #[test]
    fn test_clahe_invalid_parameters() {
        let img = GrayImage::new(16, 16);
        assert!(apply_clahe(&img, 0.0, (8, 8)).is_err());
        assert!(apply_clahe(&img, 2.0, (0, 8)).is_err());
        assert!(apply_clahe(&img, 2.0, (8, 0)).is_err());
    }
}
