use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;

use crate::domain::models::avatar::{CropWindow, AVATAR_CONTENT_TYPE};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Normalization failed: {0}")]
pub struct NormalizationFailed(pub String);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    pub edge_length: u32,
    /// Quality factor in `(0, 1]`
    pub quality: f32,
}

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
}

/// Largest square centered inside a `width × height` image.
pub fn centered_square_crop(width: u32, height: u32) -> CropWindow {
    let size = width.min(height);
    CropWindow {
        x: (width - size) / 2,
        y: (height - size) / 2,
        size,
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0).round() as i32).clamp(1, 100) as u8
}

/// Crop to a centered square, resample to `edge × edge` and encode as JPEG.
pub fn normalize_avatar(
    source: &[u8],
    options: NormalizeOptions,
) -> Result<NormalizedImage, NormalizationFailed> {
    if options.edge_length == 0 {
        return Err(NormalizationFailed(
            "Target edge length must be greater than zero".to_string(),
        ));
    }
    if !(options.quality > 0.0 && options.quality <= 1.0) {
        return Err(NormalizationFailed(format!(
            "Quality must be in (0, 1], got {}",
            options.quality
        )));
    }

    let source_image = image::load_from_memory(source)
        .map_err(|error| NormalizationFailed(format!("Failed to decode image: {}", error)))?;

    if source_image.width() == 0 || source_image.height() == 0 {
        return Err(NormalizationFailed("Source image is empty".to_string()));
    }

    let crop = centered_square_crop(source_image.width(), source_image.height());
    let square = source_image.crop_imm(crop.x, crop.y, crop.size, crop.size);
    let resized = square.resize_exact(
        options.edge_length,
        options.edge_length,
        FilterType::Lanczos3,
    );

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();

    let mut encoded = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut encoded, jpeg_quality(options.quality));
    encoder
        .encode_image(&rgb)
        .map_err(|error| NormalizationFailed(format!("Failed to encode image: {}", error)))?;

    if encoded.is_empty() {
        return Err(NormalizationFailed(
            "Encoder produced no data".to_string(),
        ));
    }

    Ok(NormalizedImage {
        bytes: encoded,
        width: rgb.width(),
        height: rgb.height(),
        content_type: AVATAR_CONTENT_TYPE,
    })
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut output = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .expect("should build png image");
    output
}
