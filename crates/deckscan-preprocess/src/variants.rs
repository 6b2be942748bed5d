//! OCR variant ladder.
//!
//! The ladder order is load-bearing: the OCR strategy walks it front to
//! back and stops at the first run that clears the early-stop confidence.
//! Required order is `[original, denoised, binarised, sharpened]`, with
//! `superres` prepended for low-resolution inputs when enabled.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::contrast::adaptive_threshold;

use deckscan_core::types::VariantKind;
use deckscan_core::{ScanConfig, MAX_WORKING_HEIGHT};

use crate::denoise::nl_means;

/// Block radius for adaptive thresholding. Chosen for ~20px card-name text.
const BINARISE_BLOCK_RADIUS: u32 = 12;

/// Unsharp-mask parameters shared by the sharpened and superres variants.
const UNSHARP_SIGMA: f32 = 1.5;
const UNSHARP_THRESHOLD: i32 = 4;

/// Linear upscale factor of the super-resolution variant.
const SUPERRES_FACTOR: u32 = 4;

/// A derived image handed to the OCR engine. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct Variant {
    /// Which derivation produced this image.
    pub kind: VariantKind,
    /// The pixels.
    pub image: DynamicImage,
}

impl Variant {
    /// Pixel width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Pixel height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Produce the ordered variant ladder for a sanitised image.
///
/// Images taller than the working cap are downscaled first; nothing is ever
/// upscaled except by the explicit super-resolution path, which works from
/// the pre-cap pixels.
#[must_use]
pub fn variant_ladder(decoded: &DynamicImage, config: &ScanConfig) -> Vec<Variant> {
    let mut ladder = Vec::with_capacity(5);

    if config.enable_superres && decoded.width() < config.superres_min_width {
        log::debug!(
            "input width {} below {}, inserting superres variant",
            decoded.width(),
            config.superres_min_width
        );
        ladder.push(Variant {
            kind: VariantKind::Superres,
            image: superres(decoded),
        });
    }

    let base = cap_working_height(decoded);
    let gray = base.to_luma8();

    ladder.push(Variant {
        kind: VariantKind::Original,
        image: base.clone(),
    });
    ladder.push(Variant {
        kind: VariantKind::Denoised,
        image: DynamicImage::ImageLuma8(nl_means(&gray)),
    });
    ladder.push(Variant {
        kind: VariantKind::Binarised,
        image: DynamicImage::ImageLuma8(binarise(&gray)),
    });
    ladder.push(Variant {
        kind: VariantKind::Sharpened,
        image: base.unsharpen(UNSHARP_SIGMA, UNSHARP_THRESHOLD),
    });

    ladder
}

fn cap_working_height(image: &DynamicImage) -> DynamicImage {
    if image.height() <= MAX_WORKING_HEIGHT {
        return image.clone();
    }
    let scale = f64::from(MAX_WORKING_HEIGHT) / f64::from(image.height());
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let width = ((f64::from(image.width()) * scale).round() as u32).max(1);
    image.resize_exact(width, MAX_WORKING_HEIGHT, FilterType::CatmullRom)
}

fn binarise(gray: &GrayImage) -> GrayImage {
    adaptive_threshold(gray, BINARISE_BLOCK_RADIUS)
}

/// 4x cubic upscale followed by an unsharp mask.
fn superres(image: &DynamicImage) -> DynamicImage {
    let upscaled = image.resize_exact(
        image.width() * SUPERRES_FACTOR,
        image.height() * SUPERRES_FACTOR,
        FilterType::CatmullRom,
    );
    upscaled.unsharpen(UNSHARP_SIGMA, UNSHARP_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                image::Rgb([20, 20, 20])
            } else {
                image::Rgb([230, 230, 230])
            }
        }))
    }

    #[test]
    fn default_ladder_order() {
        let ladder = variant_ladder(&test_image(640, 480), &ScanConfig::default());
        let kinds: Vec<VariantKind> = ladder.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                VariantKind::Original,
                VariantKind::Denoised,
                VariantKind::Binarised,
                VariantKind::Sharpened,
            ]
        );
    }

    #[test]
    fn superres_is_prepended_for_narrow_inputs() {
        let config = ScanConfig {
            enable_superres: true,
            ..ScanConfig::default()
        };
        let ladder = variant_ladder(&test_image(640, 480), &config);
        assert_eq!(ladder[0].kind, VariantKind::Superres);
        assert_eq!(ladder[0].width(), 640 * 4);
        assert_eq!(ladder.len(), 5);
    }

    #[test]
    fn superres_skipped_for_wide_inputs() {
        let config = ScanConfig {
            enable_superres: true,
            ..ScanConfig::default()
        };
        let ladder = variant_ladder(&test_image(1600, 480), &config);
        assert_eq!(ladder[0].kind, VariantKind::Original);
        assert_eq!(ladder.len(), 4);
    }

    #[test]
    fn superres_requires_the_flag() {
        let ladder = variant_ladder(&test_image(640, 480), &ScanConfig::default());
        assert!(ladder.iter().all(|v| v.kind != VariantKind::Superres));
    }

    #[test]
    fn tall_images_are_capped() {
        let ladder = variant_ladder(&test_image(900, 3000), &ScanConfig::default());
        let original = &ladder[0];
        assert_eq!(original.height(), MAX_WORKING_HEIGHT);
        assert_eq!(original.width(), 450);
    }

    #[test]
    fn short_images_are_never_upscaled() {
        let ladder = variant_ladder(&test_image(320, 200), &ScanConfig::default());
        assert_eq!(ladder[0].width(), 320);
        assert_eq!(ladder[0].height(), 200);
    }
}
