use std::time::Duration;

use crate::scanner::ScanPhase;

/// Failures acquiring or driving the capture device.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("no capture device available")]
    NoDevice,
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera stream did not start within {0:?}")]
    StartTimeout(Duration),
    #[error("camera device error: {0}")]
    Device(String),
    #[error("torch is not supported by the active camera")]
    TorchUnsupported,
}

/// Product lookup failures. Callers degrade these to a not-found card.
#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("lookup returned HTTP {0}")]
    Status(u16),
    #[error("lookup response could not be parsed: {0}")]
    Parse(String),
}

/// Persistence adapter failures. History and settings log and swallow these.
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<anyhow::Error> for PersistenceError {
    fn from(err: anyhow::Error) -> Self {
        PersistenceError::Backend(format!("{err:#}"))
    }
}

/// Errors surfaced by the scan controller's command interface.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("code is empty")]
    EmptyCode,
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("cannot {operation} while {phase:?}")]
    InvalidState {
        operation: &'static str,
        phase: ScanPhase,
    },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
