//! Pixel frames and the decoder capability.

use std::fmt;

/// Bytes per pixel in the RGBA8 layout every frame uses.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    EmptyDimensions,
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::EmptyDimensions => write!(f, "frame has zero width or height"),
            FrameError::LengthMismatch { expected, actual } => write!(
                f,
                "frame buffer is {actual} bytes, expected {expected} (RGBA, stride = width)"
            ),
        }
    }
}

impl std::error::Error for FrameError {}

/// One RGBA8 image, row-major, stride equal to `width`.
///
/// The constructor enforces the layout, so a `Frame` handed to a decoder is
/// always well-formed.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// # Errors
    /// Returns a `FrameError` if either dimension is zero or the buffer
    /// length is not `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions);
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Runs `decoder` over this frame.
    pub fn decode_with(&self, decoder: &dyn Decoder) -> Option<String> {
        decoder
            .decode(&self.pixels, self.width, self.height)
            .filter(|payload| !payload.is_empty())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// QR decoding capability: RGBA pixels in, payload text out.
///
/// Implemented for any matching closure, so tests and adapters can pass a
/// plain function.
pub trait Decoder: Send + Sync {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<String>;
}

impl<F> Decoder for F
where
    F: Fn(&[u8], u32, u32) -> Option<String> + Send + Sync,
{
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<String> {
        self(pixels, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_stride() {
        let err = Frame::from_rgba(2, 2, vec![0; 12]).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                expected: 16,
                actual: 12
            }
        );
        assert!(Frame::from_rgba(0, 5, Vec::new()).is_err());
        assert!(Frame::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_closure_decoder_sees_dimensions() {
        let frame = Frame::from_rgba(3, 1, vec![7; 12]).unwrap();
        let decoder = |pixels: &[u8], w: u32, h: u32| {
            assert_eq!(pixels.len(), 12);
            Some(format!("{w}x{h}"))
        };
        assert_eq!(frame.decode_with(&decoder), Some("3x1".to_string()));
    }

    #[test]
    fn test_empty_payload_counts_as_not_found() {
        let frame = Frame::from_rgba(1, 1, vec![0; 4]).unwrap();
        let decoder = |_: &[u8], _: u32, _: u32| Some(String::new());
        assert_eq!(frame.decode_with(&decoder), None);
    }
}
