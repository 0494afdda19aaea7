//! Image helpers: upload checks, resizing for the vision API and WebP thumbnails.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};

/// File extensions the processor understands.
pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("unsupported file type '{0}'")]
    UnsupportedFormat(String),

    #[error("file is empty")]
    Empty,

    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("file content is not a recognised image")]
    NotAnImage,
}

/// Lowercase extension of a file name, if any.
pub fn extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Cheap checks done before decoding: extension, size and magic bytes.
pub fn check_upload(
    filename: &str,
    data: &[u8],
    accepted: &[String],
    max_bytes: usize,
) -> Result<ImageFormat, UploadError> {
    let ext = extension(filename).unwrap_or_default();
    if !accepted.iter().any(|a| a == &ext) {
        return Err(UploadError::UnsupportedFormat(ext));
    }

    if data.is_empty() {
        return Err(UploadError::Empty);
    }

    if data.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: data.len(),
            limit: max_bytes,
        });
    }

    if !infer::is_image(data) {
        return Err(UploadError::NotAnImage);
    }

    let format = detect_format(data).ok_or(UploadError::NotAnImage)?;
    let allowed = format_extensions(format)
        .iter()
        .any(|ext| accepted.iter().any(|a| a == ext));
    if !allowed {
        return Err(UploadError::UnsupportedFormat(
            format!("{format:?}").to_lowercase(),
        ));
    }

    Ok(format)
}

/// Extensions a decoded format may be accepted under.
fn format_extensions(format: ImageFormat) -> &'static [&'static str] {
    match format {
        ImageFormat::Png => &["png"],
        ImageFormat::Jpeg => &["jpg", "jpeg"],
        ImageFormat::Gif => &["gif"],
        ImageFormat::Bmp => &["bmp"],
        _ => &[],
    }
}

/// Detect image format from bytes
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}

/// Hex SHA-256 of raw bytes.
pub fn content_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Dimensions after fitting `(w, h)` into a `max_dimension` square.
/// Returns `None` when no resize is needed.
pub fn fit_within(w: u32, h: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if w <= max_dimension && h <= max_dimension {
        return None;
    }

    let scale = (max_dimension as f64) / (w.max(h) as f64);
    let new_w = ((w as f64) * scale).round() as u32;
    let new_h = ((h as f64) * scale).round() as u32;
    Some((new_w.clamp(1, max_dimension), new_h.clamp(1, max_dimension)))
}

fn downscale(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    match fit_within(w, h, max_dimension) {
        Some((new_w, new_h)) => img.resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3),
        None => img.clone(),
    }
}

/// PNG bytes of the image, downscaled so neither side exceeds `max_dimension`.
pub fn optimize_for_vision(img: &DynamicImage, max_dimension: u32) -> Result<Vec<u8>> {
    let resized = downscale(img, max_dimension);
    encode_png(&resized)
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .context("Failed to encode png")?;
    Ok(buf)
}

/// Downscaled lossy WebP used for UI thumbnails.
pub fn thumbnail(img: &DynamicImage, max_dimension: u32, quality: u8) -> Vec<u8> {
    let rgba = downscale(img, max_dimension).to_rgba8();
    let (width, height) = rgba.dimensions();

    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    encoder.encode(quality as f32).to_vec()
}

/// Check if data starts with WebP magic bytes (RIFF....WEBP)
pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && data[0..4] == *b"RIFF" && data[8..12] == *b"WEBP"
}
