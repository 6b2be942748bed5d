//! Non-local-means denoising.
//!
//! A compact NL-means over grayscale pixels: each output pixel is a weighted
//! average of pixels in a search window, weighted by the similarity of their
//! 3x3 patches. Screenshot noise is mild, so the window and patch radii stay
//! small to keep the variant cheap relative to the OCR call that follows.

use image::GrayImage;

/// Patch radius (3x3 patches).
const PATCH_RADIUS: i64 = 1;
/// Search window radius (7x7 window).
const SEARCH_RADIUS: i64 = 3;
/// Filtering strength. Larger values smooth more aggressively.
const H: f32 = 10.0;
/// Assumed sensor noise; subtracted from patch distances.
const SIGMA: f32 = 5.0;

/// Denoise a grayscale image with simplified non-local means.
#[must_use]
pub fn nl_means(input: &GrayImage) -> GrayImage {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
        return input.clone();
    }
    let w = i64::from(width);
    let h = i64::from(height);
    let pixel = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, w - 1);
        let cy = y.clamp(0, h - 1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        f32::from(input.get_pixel(cx as u32, cy as u32).0[0])
    };

    let patch_distance = |ax: i64, ay: i64, bx: i64, by: i64| -> f32 {
        let mut sum = 0.0;
        for dy in -PATCH_RADIUS..=PATCH_RADIUS {
            for dx in -PATCH_RADIUS..=PATCH_RADIUS {
                let diff = pixel(ax + dx, ay + dy) - pixel(bx + dx, by + dy);
                sum += diff * diff;
            }
        }
        let count = ((2 * PATCH_RADIUS + 1) * (2 * PATCH_RADIUS + 1)) as f32;
        sum / count
    };

    let mut output = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut weight_sum = 0.0f32;
            let mut value_sum = 0.0f32;
            for sy in -SEARCH_RADIUS..=SEARCH_RADIUS {
                for sx in -SEARCH_RADIUS..=SEARCH_RADIUS {
                    let d2 = patch_distance(x, y, x + sx, y + sy);
                    let adjusted = (d2 - 2.0 * SIGMA * SIGMA).max(0.0);
                    let weight = (-adjusted / (H * H)).exp();
                    weight_sum += weight;
                    value_sum += weight * pixel(x + sx, y + sy);
                }
            }
            let value = (value_sum / weight_sum).round().clamp(0.0, 255.0);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            output.put_pixel(x as u32, y as u32, image::Luma([value as u8]));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_dimensions() {
        let input = GrayImage::from_pixel(17, 9, image::Luma([128]));
        let out = nl_means(&input);
        assert_eq!(out.dimensions(), (17, 9));
    }

    #[test]
    fn uniform_image_is_unchanged() {
        let input = GrayImage::from_pixel(16, 16, image::Luma([77]));
        let out = nl_means(&input);
        assert!(out.pixels().all(|p| p.0[0] == 77));
    }

    #[test]
    fn reduces_salt_noise() {
        let mut input = GrayImage::from_pixel(16, 16, image::Luma([100]));
        input.put_pixel(8, 8, image::Luma([255]));
        let out = nl_means(&input);
        let denoised = out.get_pixel(8, 8).0[0];
        assert!(denoised < 255, "spike should be attenuated, got {denoised}");
    }

    #[test]
    fn is_deterministic() {
        let mut input = GrayImage::from_pixel(12, 12, image::Luma([100]));
        input.put_pixel(3, 4, image::Luma([10]));
        input.put_pixel(9, 2, image::Luma([240]));
        assert_eq!(nl_means(&input), nl_means(&input));
    }
}
