//! Image encoding: page file → re-encoded JPEG → base64 `ImageData`.
//!
//! The page is decoded and encoded again rather than uploaded byte-for-byte,
//! so whatever a custom renderer wrote (PNG, CMYK JPEG, ...) reaches the
//! provider as a plain RGB JPEG with the configured quality.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// MIME type of every uploaded page.
pub const PAGE_MIME_TYPE: &str = "image/jpeg";

/// Re-encode the image at `path` as JPEG and wrap it for the VLM API.
pub fn encode_page_file(path: &Path, quality: u8) -> Result<ImageData, image::ImageError> {
    let img = image::open(path)?;
    encode_page(&img, quality)
}

/// Encode an in-memory page as a base64 JPEG.
///
/// `detail: "high"` asks OpenAI-style providers for full-resolution tiling;
/// table rows in small print are lost at low detail.
pub fn encode_page(img: &DynamicImage, quality: u8) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes JPEG, {} bytes base64", buf.len(), b64.len());

    Ok(ImageData::new(b64, PAGE_MIME_TYPE).with_detail("high"))
}
