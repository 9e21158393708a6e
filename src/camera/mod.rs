//! Frame source abstraction. The scanner never talks to a capture device
//! directly; it only needs start/stop, a current frame, and the torch.

pub mod replay;

use async_trait::async_trait;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::CameraError;

pub use replay::ImageSequenceSource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Environment => FacingMode::User,
            FacingMode::User => FacingMode::Environment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
    pub facing: Option<FacingMode>,
}

/// One luminance frame handed to the decoder.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub image: GrayImage,
}

impl Frame {
    pub fn new(sequence: u64, image: GrayImage) -> Self {
        Self { sequence, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Capture devices currently visible. Empty means no camera at all.
    async fn devices(&self) -> Vec<CameraDevice>;

    /// Acquires the device for `facing` and starts streaming. The controller
    /// bounds this with its own start timeout.
    async fn start(&self, facing: FacingMode) -> Result<(), CameraError>;

    async fn stop(&self);

    /// Latest frame, or `None` when the stream has nothing new yet.
    fn grab_frame(&self) -> Option<Frame>;

    fn has_torch(&self) -> bool;

    async fn set_torch(&self, on: bool) -> Result<(), CameraError>;
}
