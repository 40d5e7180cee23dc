use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

use crate::error::RepairError;

pub fn load_page(path: &Path, page: usize) -> Result<DynamicImage, RepairError> {
    image::open(path).map_err(|e| RepairError::Page {
        page,
        message: format!("Failed to load rendered page: {}", e),
    })
}

/// Converts a rendered page to single-channel grayscale and, when
/// `max_width` is set, caps its width preserving the aspect ratio.
///
/// Grayscale runs first so the resize only touches one channel.
pub fn normalize_page(image: &DynamicImage, max_width: Option<u32>) -> GrayImage {
    let gray = image.to_luma8();

    match max_width {
        Some(max) if gray.width() > max => {
            let height = scaled_height(gray.width(), gray.height(), max);
            // CatmullRom avoids the ringing Lanczos3 puts around glyph edges.
            image::imageops::resize(&gray, max, height, FilterType::CatmullRom)
        }
        _ => gray,
    }
}

pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (height as f64 * target_width as f64 / width as f64).round() as u32;
    scaled.max(1)
}
