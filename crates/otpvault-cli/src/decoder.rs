//! QR decoding backed by `rqrr`.

use otpvault_core::scan::Decoder;
use tracing::debug;

/// Decodes the first readable QR grid in an RGBA frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl Decoder for RqrrDecoder {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<String> {
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || pixels.len() < w * h * 4 {
            return None;
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
            let i = (y * w + x) * 4;
            luma(pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3])
        });

        prepared.detect_grids().into_iter().find_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(content),
            Err(e) => {
                debug!(error = %e, "QR grid failed to decode");
                None
            }
        })
    }
}

/// Rec. 601 luma, composited over white.
fn luma(r: u8, g: u8, b: u8, a: u8) -> u8 {
    let y = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
    let a = u32::from(a);
    ((y * a + 255 * (255 - a)) / 255) as u8
}

#[cfg(test)]
mod tests {
    use qrcode::{Color, QrCode};

    use super::*;

    const SCALE: usize = 6;
    const QUIET: usize = 4;

    fn render(payload: &str) -> (Vec<u8>, u32) {
        let code = QrCode::new(payload.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET) * SCALE;

        let mut pixels = vec![255u8; side * side * 4];
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / SCALE, y / SCALE);
                let dark = mx >= QUIET
                    && my >= QUIET
                    && mx < QUIET + modules
                    && my < QUIET + modules
                    && colors[(my - QUIET) * modules + (mx - QUIET)] == Color::Dark;
                if dark {
                    let i = (y * side + x) * 4;
                    pixels[i..i + 3].fill(0);
                }
            }
        }
        (pixels, side as u32)
    }

    #[test]
    fn test_decodes_rendered_qr() {
        let uri = "otpauth://totp/Acme:bob?secret=JBSWY3DPEHPK3PXP&issuer=Acme";
        let (pixels, side) = render(uri);
        assert_eq!(RqrrDecoder.decode(&pixels, side, side).as_deref(), Some(uri));
    }

    #[test]
    fn test_blank_frame_has_no_code() {
        let pixels = vec![255u8; 32 * 32 * 4];
        assert_eq!(RqrrDecoder.decode(&pixels, 32, 32), None);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        assert_eq!(RqrrDecoder.decode(&[0; 8], 4, 4), None);
    }

    #[test]
    fn test_transparent_pixels_read_as_white() {
        assert_eq!(luma(0, 0, 0, 0), 255);
        assert_eq!(luma(0, 0, 0, 255), 0);
        assert_eq!(luma(255, 255, 255, 255), 255);
    }
}
