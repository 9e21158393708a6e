use log::debug;

use super::{DetectionResult, Decoder};
use crate::camera::Frame;

/// QR decoding backed by `rqrr`. Takes the first grid that decodes cleanly.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for QrDecoder {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn decode(&self, frame: &Frame) -> Option<DetectionResult> {
        let image = &frame.image;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            image.width() as usize,
            image.height() as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) if !content.trim().is_empty() => {
                    return Some(DetectionResult::new(content, "qr_code"));
                }
                Ok(_) => {}
                Err(err) => debug!("QR grid in frame {} failed to decode: {err:?}", frame.sequence),
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn blank_frame_has_no_code() {
        let frame = Frame::new(0, GrayImage::from_pixel(64, 64, Luma([255])));
        assert!(QrDecoder::new().decode(&frame).is_none());
    }

    #[test]
    fn noise_frame_has_no_code() {
        let image = GrayImage::from_fn(64, 64, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
        assert!(QrDecoder::new().decode(&Frame::new(1, image)).is_none());
    }
}
