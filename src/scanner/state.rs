use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::camera::FacingMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScanPhase {
    #[default]
    Idle,
    AwaitingPermission,
    /// Camera live, decode loop not running.
    Streaming,
    Scanning,
    /// A result is on screen.
    Confirmed,
    CameraUnavailable,
    Error,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::AwaitingPermission => "awaitingPermission",
            ScanPhase::Streaming => "streaming",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Confirmed => "confirmed",
            ScanPhase::CameraUnavailable => "cameraUnavailable",
            ScanPhase::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: ScanPhase,
    pub facing: FacingMode,
    pub flash_on: bool,
    /// Scan loop should keep going. Checked by every tick.
    pub running: bool,
    pub stream_active: bool,
    pub torch_available: bool,
    /// At least one capture device was found.
    pub camera_available: bool,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: ScanPhase::Idle,
            facing: FacingMode::Environment,
            flash_on: false,
            running: false,
            stream_active: false,
            torch_available: false,
            camera_available: true,
            last_error: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_started(&mut self, torch_available: bool) {
        self.phase = ScanPhase::Streaming;
        self.stream_active = true;
        self.torch_available = torch_available;
        self.flash_on = false;
        self.last_error = None;
    }

    pub fn stream_failed(&mut self, message: String) {
        self.phase = ScanPhase::Error;
        self.stream_active = false;
        self.running = false;
        self.torch_available = false;
        self.flash_on = false;
        self.last_error = Some(message);
    }

    /// Camera released; facing and device availability are kept.
    pub fn stream_stopped(&mut self) {
        self.phase = ScanPhase::Idle;
        self.stream_active = false;
        self.running = false;
        self.torch_available = false;
        self.flash_on = false;
    }
}

/// Counters for the current scan, reset by every `start_scanning`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub started_at: Option<DateTime<Utc>>,
    pub frames_processed: u64,
    pub raw_detections: u64,
    pub filtered_detections: u64,
}

impl ScanStats {
    pub fn begin(at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(at),
            ..Self::default()
        }
    }

    /// Frames per second since the scan started.
    pub fn frame_rate(&self, now: DateTime<Utc>) -> f64 {
        let Some(started_at) = self.started_at else {
            return 0.0;
        };
        let elapsed_ms = (now - started_at).num_milliseconds();
        if elapsed_ms <= 0 {
            return 0.0;
        }
        self.frames_processed as f64 * 1000.0 / elapsed_ms as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stream_failure_clears_live_flags() {
        let mut state = SessionState::new();
        state.stream_started(true);
        state.flash_on = true;
        state.running = true;
        state.stream_failed("denied".into());

        assert_eq!(state.phase, ScanPhase::Error);
        assert!(!state.stream_active && !state.running && !state.flash_on);
        assert_eq!(state.last_error.as_deref(), Some("denied"));
    }

    #[test]
    fn frame_rate_uses_elapsed_time() {
        let start = Utc::now();
        let mut stats = ScanStats::begin(start);
        stats.frames_processed = 30;
        assert_eq!(stats.frame_rate(start + Duration::seconds(2)), 15.0);
        assert_eq!(stats.frame_rate(start), 0.0);
        assert_eq!(ScanStats::default().frame_rate(start), 0.0);
    }
}
