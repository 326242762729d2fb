//! Image handling module
//!
//! Handles the image work every backend shares:
//! - Decoding arbitrary uploaded bytes (PNG, JPEG, WebP, ...)
//! - Normalization to 8-bit RGB
//! - PNG re-encoding for backends that require it
//! - Content fingerprinting for log correlation

use image::RgbImage;
use sha2::{Digest, Sha256};

use crate::error::VlmError;

/// Decode uploaded bytes and normalize to 8-bit RGB
///
/// Accepts any container format the `image` crate understands and
/// collapses alpha/grayscale/16-bit variants into the RGB8 layout the
/// model backends expect.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, VlmError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded.to_rgb8())
}

/// Re-encode a normalized image as PNG
///
/// The Ollama daemon only accepts a fixed set of encodings, so uploads
/// are always re-encoded rather than forwarded verbatim.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, VlmError> {
    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    image.write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(out)
}

/// Compute a short SHA-256 fingerprint of an upload
///
/// Returns the first 12 hex characters, enough to correlate log lines
/// without dumping full digests everywhere.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb, Rgba};

    fn png_bytes(image: RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_decode_rgb_roundtrip() {
        let original = ImageBuffer::from_pixel(10, 10, Rgb([255u8, 0u8, 0u8]));
        let bytes = png_bytes(original.clone());

        let decoded = decode_rgb(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (10, 10));
        assert_eq!(decoded.get_pixel(5, 5), &Rgb([255u8, 0u8, 0u8]));
    }

    #[test]
    fn test_decode_rgb_flattens_alpha() {
        let rgba = ImageBuffer::from_pixel(4, 4, Rgba([0u8, 128u8, 0u8, 255u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_rgb(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([0u8, 128u8, 0u8]));
    }

    #[test]
    fn test_decode_rgb_rejects_garbage() {
        let result = decode_rgb(b"this is not an image");
        assert!(matches!(result, Err(VlmError::Decode(_))));
    }

    #[test]
    fn test_encode_png_is_decodable() {
        let original = ImageBuffer::from_pixel(8, 8, Rgb([10u8, 20u8, 30u8]));
        let encoded = encode_png(&original).unwrap();

        let decoded = decode_rgb(&encoded).unwrap();
        assert_eq!(decoded.as_raw(), original.as_raw());
    }

    #[test]
    fn test_content_fingerprint_deterministic() {
        let a = content_fingerprint(b"same bytes");
        let b = content_fingerprint(b"same bytes");
        let c = content_fingerprint(b"other bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
    }
}
