use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::BarcodeFormat;

/// One raw decode observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub code: String,
    pub format: BarcodeFormat,
    /// Milliseconds on the controller's clock.
    pub observed_at: i64,
}

/// Thresholds the engine evaluates against. Built from `ScannerSettings`
/// on every observation so settings changes apply mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub require_multiple: bool,
    pub min_detections: u32,
    pub timeout_ms: i64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            require_multiple: true,
            min_detections: 2,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Seen `count` times inside the window, `needed` required.
    Pending { count: u32, needed: u32 },
    Confirmed(DetectionEvent),
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed(_))
    }
}

/// Sliding time window of raw detections. A code is confirmed once it has
/// been seen `min_detections` times within `timeout_ms`; other codes in the
/// window do not break the count.
#[derive(Debug, Default)]
pub struct ConfirmationEngine {
    window: VecDeque<DetectionEvent>,
}

impl ConfirmationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        code: &str,
        format: BarcodeFormat,
        now: i64,
        policy: &ConfirmationPolicy,
    ) -> Confirmation {
        self.window.push_back(DetectionEvent {
            code: code.to_string(),
            format,
            observed_at: now,
        });
        self.prune(now, policy.timeout_ms);

        let count = self.window.iter().filter(|event| event.code == code).count() as u32;
        let needed = policy.min_detections.max(1);

        if !policy.require_multiple || count >= needed {
            self.window.clear();
            return Confirmation::Confirmed(DetectionEvent {
                code: code.to_string(),
                format,
                observed_at: now,
            });
        }

        Confirmation::Pending { count, needed }
    }

    /// Drops everything observed `timeout_ms` or longer before `now`.
    pub fn prune(&mut self, now: i64, timeout_ms: i64) {
        self.window
            .retain(|event| now.saturating_sub(event.observed_at) < timeout_ms);
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn window(&self) -> impl Iterator<Item = &DetectionEvent> {
        self.window.iter()
    }
}
