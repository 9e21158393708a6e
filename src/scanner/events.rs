use serde::Serialize;

use super::state::SessionState;
use crate::{history::ScanRecord, product::ProductCard, settings::ScannerSettings};

/// Everything the presentation layer hears from the controller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ScannerEvent {
    PhaseChanged { session: SessionState },
    /// Visual flash for a confirmed code; the beep is played separately.
    DetectionFeedback { code: String },
    ScanConfirmed { record: ScanRecord },
    ProductResolved { record_id: String, card: ProductCard },
    HistoryChanged { len: usize },
    SettingsChanged { settings: ScannerSettings },
    FlashChanged { on: bool },
    /// No stream to scan with; the user should type the code instead.
    ManualEntryRequested,
}

/// The record being displayed and its product card.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentScan {
    pub record: ScanRecord,
    pub card: ProductCard,
}
