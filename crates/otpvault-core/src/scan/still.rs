//! Still-image loading for the upload fallback.

use std::path::Path;

use anyhow::{Context, Result};

use super::frame::Frame;

/// Decodes an encoded image (PNG, JPEG, WebP) into an RGBA frame.
///
/// # Errors
/// Returns an error if the format is unknown or the data is corrupt.
pub fn frame_from_image_bytes(data: &[u8]) -> Result<Frame> {
    let reader = image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .context("detect image format")?;
    let decoded = reader.decode().context("decode image")?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::from_rgba(width, height, rgba.into_raw()).context("convert image to RGBA frame")
}

/// Reads and decodes an image file.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
pub fn frame_from_image_file(path: &Path) -> Result<Frame> {
    let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    frame_from_image_bytes(&data).with_context(|| format!("{}", path.display()))
}

#[cfg(test)]
mod tests {
    use image::ImageEncoder as _;
    use image::codecs::png::PngEncoder;

    use super::*;

    fn tiny_png() -> Vec<u8> {
        let pixels: Vec<u8> = vec![255, 0, 0, 255, 0, 255, 0, 255];
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&pixels, 2, 1, image::ExtendedColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_becomes_rgba_frame() {
        let frame = frame_from_image_bytes(&tiny_png()).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.pixels(), &[255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(frame_from_image_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn test_missing_file_mentions_path() {
        let err = frame_from_image_file(Path::new("/nonexistent/qr.png")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/qr.png"));
    }
}
