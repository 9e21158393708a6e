use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex,
    },
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::GrayImage;

use super::{CameraDevice, FacingMode, Frame, FrameSource};
use crate::error::CameraError;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Replays still images as a looping camera stream. Stands in for a real
/// capture device on the command line and in demos.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    frames: Mutex<Vec<GrayImage>>,
    cursor: AtomicU64,
    streaming: AtomicBool,
}

impl ImageSequenceSource {
    /// Collects every image file directly inside `dir`, sorted by name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();
        log_info!("Replay source found {} frame(s) in {}", paths.len(), dir.display());

        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            frames: Mutex::new(Vec::new()),
            cursor: AtomicU64::new(0),
            streaming: AtomicBool::new(false),
        }
    }

    /// Pre-decoded frames, no files involved.
    pub fn from_images(images: Vec<GrayImage>) -> Self {
        let source = Self::from_paths(Vec::new());
        if let Ok(mut frames) = source.frames.lock() {
            *frames = images;
        }
        source
    }

    fn frame_count(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }
}

#[async_trait]
impl FrameSource for ImageSequenceSource {
    async fn devices(&self) -> Vec<CameraDevice> {
        if self.paths.is_empty() && self.frame_count() == 0 {
            return Vec::new();
        }
        vec![CameraDevice {
            id: "replay-0".into(),
            label: "Image replay".into(),
            facing: Some(FacingMode::Environment),
        }]
    }

    async fn start(&self, facing: FacingMode) -> Result<(), CameraError> {
        if !self.paths.is_empty() && self.frame_count() == 0 {
            let paths = self.paths.clone();
            let decoded = tokio::task::spawn_blocking(move || {
                paths
                    .iter()
                    .filter_map(|path| match image::open(path) {
                        Ok(img) => Some(img.to_luma8()),
                        Err(err) => {
                            log_warn!("Skipping unreadable frame {}: {err}", path.display());
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|err| CameraError::Device(format!("frame loader failed: {err}")))?;

            let mut frames = self
                .frames
                .lock()
                .map_err(|_| CameraError::Device("frame buffer poisoned".into()))?;
            *frames = decoded;
        }

        if self.frame_count() == 0 {
            return Err(CameraError::NoDevice);
        }

        self.cursor.store(0, Ordering::SeqCst);
        self.streaming.store(true, Ordering::SeqCst);
        log_info!("Replay stream started ({} facing)", facing.as_str());
        Ok(())
    }

    async fn stop(&self) {
        self.streaming.store(false, Ordering::SeqCst);
    }

    fn grab_frame(&self) -> Option<Frame> {
        if !self.streaming.load(Ordering::SeqCst) {
            return None;
        }
        let frames = self.frames.lock().ok()?;
        if frames.is_empty() {
            return None;
        }
        let sequence = self.cursor.fetch_add(1, Ordering::SeqCst);
        let image = frames[(sequence % frames.len() as u64) as usize].clone();
        Some(Frame::new(sequence, image))
    }

    fn has_torch(&self) -> bool {
        false
    }

    async fn set_torch(&self, _on: bool) -> Result<(), CameraError> {
        Err(CameraError::TorchUnsupported)
    }
}
