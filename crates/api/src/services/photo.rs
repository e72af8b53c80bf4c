//! Photo preparation before upload.
//!
//! Every request photo is decoded, scaled down to fit a
//! [`MAX_DIMENSION`] square, and re-encoded as JPEG, stepping quality down
//! until the result fits [`TARGET_BYTES`].

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// Longest edge after compression, in pixels.
pub const MAX_DIMENSION: u32 = 1920;
/// Size the encoder aims for.
pub const TARGET_BYTES: usize = 1024 * 1024;
/// JPEG qualities tried in order. The last one is used even if too large.
const QUALITY_STEPS: [u8; 6] = [85, 75, 65, 55, 45, 35];

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("Photo could not be read: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Photo could not be compressed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Photo processing was interrupted: {0}")]
    Interrupted(String),
}

/// Decode, downscale and re-encode `bytes` as JPEG.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, PhotoError> {
    let decoded = image::load_from_memory(bytes).map_err(PhotoError::Decode)?;
    let rgb = fit_within(decoded, MAX_DIMENSION).to_rgb8();

    let mut encoded = Vec::new();
    for quality in QUALITY_STEPS {
        encoded = encode_jpeg(&rgb, quality)?;
        if encoded.len() <= TARGET_BYTES {
            break;
        }
        tracing::debug!(quality, size = encoded.len(), "Photo above target size, lowering quality");
    }
    Ok(encoded)
}

/// [`compress`] on the blocking pool.
pub async fn compress_blocking(bytes: Vec<u8>) -> Result<Vec<u8>, PhotoError> {
    tokio::task::spawn_blocking(move || compress(&bytes))
        .await
        .map_err(|e| PhotoError::Interrupted(e.to_string()))?
}

fn fit_within(image: DynamicImage, max: u32) -> DynamicImage {
    if image.width() <= max && image.height() <= max {
        return image;
    }
    // `resize` keeps the aspect ratio.
    image.resize(max, max, FilterType::Triangle)
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(rgb)
        .map_err(PhotoError::Encode)?;
    Ok(out.into_inner())
}
