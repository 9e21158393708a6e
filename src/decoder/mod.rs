//! Pluggable decoders: one frame in, at most one code out.

pub mod qr;
pub mod simulated;

use serde::{Deserialize, Serialize};

use crate::{camera::Frame, detection::BarcodeFormat};

pub use qr::QrDecoder;
pub use simulated::SimulatedDecoder;

/// Raw decoder output. `format` is whatever label the library reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub code: String,
    pub format: String,
}

impl DetectionResult {
    pub fn new(code: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            format: format.into(),
        }
    }

    pub fn barcode_format(&self) -> BarcodeFormat {
        BarcodeFormat::from_label(&self.format)
    }
}

/// A frame with no readable code is `None`, never an error.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, frame: &Frame) -> Option<DetectionResult>;

    /// Drops any per-scan state (pending simulated detections and the like).
    fn reset(&self) {}
}
