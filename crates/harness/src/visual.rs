//! Screenshot comparison against reference images

use image::{GenericImageView, Pixel, RgbaImage};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};

/// Per-channel tolerance; absorbs anti-aliasing and compression noise.
const CHANNEL_TOLERANCE: i32 = 5;

/// Result of comparing a generated screenshot against a reference.
#[derive(Debug, Clone)]
pub struct VisualDiff {
    /// Whether the images differ beyond tolerance
    pub differs: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    /// Number of differing pixels
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Path of the diff image, written only when the images differ
    pub diff_image: Option<PathBuf>,
}

/// Compare `generated` against `reference`, writing a red-marked diff
/// image to `diff_out` when they differ.
pub fn compare(generated: &Path, reference: &Path, diff_out: &Path) -> HarnessResult<VisualDiff> {
    if !generated.exists() {
        return Err(HarnessError::Renderer(format!(
            "generated screenshot not found: {}",
            generated.display()
        )));
    }

    // Identical bytes short-circuit the pixel walk
    if hash_file(generated)? == hash_file(reference)? {
        debug!("Screenshots match exactly (same hash)");
        return Ok(VisualDiff {
            differs: false,
            diff_percent: 0.0,
            diff_pixels: 0,
            total_pixels: 0,
            diff_image: None,
        });
    }

    let generated_img = image::open(generated)?;
    let reference_img = image::open(reference)?;

    // A cropped or padded screenshot is a difference in itself, even
    // when the overlapping region matches; the walk below only marks
    // per-pixel drift inside the overlap.
    let dimension_mismatch = generated_img.dimensions() != reference_img.dimensions();
    if dimension_mismatch {
        warn!(
            "Screenshot dimensions differ: generated {:?} vs reference {:?}",
            generated_img.dimensions(),
            reference_img.dimensions()
        );
    }

    let (width, height) = generated_img.dimensions();
    let generated_rgba = generated_img.to_rgba8();
    let reference_rgba = reference_img.to_rgba8();

    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;
    let total_pixels = (width as u64) * (height as u64);

    for y in 0..height.min(reference_img.height()) {
        for x in 0..width.min(reference_img.width()) {
            let generated_pixel = generated_rgba.get_pixel(x, y);
            let reference_pixel = reference_rgba.get_pixel(x, y);

            if pixels_differ(generated_pixel, reference_pixel) {
                diff_pixels += 1;
                diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            } else {
                // Dimmed original as context around the marked pixels
                let channels = generated_pixel.channels();
                diff_img.put_pixel(
                    x,
                    y,
                    image::Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                );
            }
        }
    }

    let differs = diff_pixels > 0 || dimension_mismatch;
    let diff_percent = (diff_pixels as f64 / total_pixels as f64) * 100.0;

    let diff_image = if differs {
        diff_img.save(diff_out)?;
        Some(diff_out.to_path_buf())
    } else {
        None
    };

    Ok(VisualDiff {
        differs,
        diff_percent,
        diff_pixels,
        total_pixels,
        diff_image,
    })
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    let a_channels = a.channels();
    let b_channels = b.channels();

    for i in 0..4 {
        let diff = (a_channels[i] as i32 - b_channels[i] as i32).abs();
        if diff > CHANNEL_TOLERANCE {
            return true;
        }
    }

    false
}

fn hash_file(path: &Path) -> HarnessResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, color: [u8; 4]) -> PathBuf {
        write_png_sized(dir, name, 8, color)
    }

    fn write_png_sized(dir: &TempDir, name: &str, size: u32, color: [u8; 4]) -> PathBuf {
        let mut img = RgbaImage::new(size, size);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba(color);
        }
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_identical_images_do_not_differ() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(&tmp, "a.png", [10, 20, 30, 255]);
        let b = write_png(&tmp, "b.png", [10, 20, 30, 255]);
        let diff_out = tmp.path().join("diff.png");

        let diff = compare(&a, &b, &diff_out).unwrap();
        assert!(!diff.differs);
        assert!(diff.diff_image.is_none());
        assert!(!diff_out.exists());
    }

    #[test]
    fn test_within_tolerance_does_not_differ() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(&tmp, "a.png", [10, 20, 30, 255]);
        let b = write_png(&tmp, "b.png", [12, 22, 28, 255]);
        let diff_out = tmp.path().join("diff.png");

        let diff = compare(&a, &b, &diff_out).unwrap();
        assert!(!diff.differs);
        assert_eq!(diff.diff_pixels, 0);
    }

    #[test]
    fn test_differing_images_write_diff() {
        let tmp = TempDir::new().unwrap();
        let a = write_png(&tmp, "a.png", [10, 20, 30, 255]);
        let b = write_png(&tmp, "b.png", [200, 20, 30, 255]);
        let diff_out = tmp.path().join("diff.png");

        let diff = compare(&a, &b, &diff_out).unwrap();
        assert!(diff.differs);
        assert_eq!(diff.diff_pixels, 64);
        assert_eq!(diff.diff_image.as_deref(), Some(diff_out.as_path()));
        assert!(diff_out.exists());
    }

    #[test]
    fn test_dimension_mismatch_differs() {
        let tmp = TempDir::new().unwrap();
        // Same color everywhere, so the overlapping region matches
        let a = write_png_sized(&tmp, "a.png", 8, [10, 20, 30, 255]);
        let b = write_png_sized(&tmp, "b.png", 4, [10, 20, 30, 255]);
        let diff_out = tmp.path().join("diff.png");

        let diff = compare(&a, &b, &diff_out).unwrap();
        assert!(diff.differs);
        assert_eq!(diff.diff_pixels, 0);
        assert!(diff_out.exists());
    }

    #[test]
    fn test_missing_generated_is_error() {
        let tmp = TempDir::new().unwrap();
        let b = write_png(&tmp, "b.png", [0, 0, 0, 255]);
        let err = compare(&tmp.path().join("missing.png"), &b, &tmp.path().join("d.png"));
        assert!(err.is_err());
    }
}
