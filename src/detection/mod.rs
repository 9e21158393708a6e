pub mod confirm;
pub mod format;

pub use confirm::{Confirmation, ConfirmationEngine, ConfirmationPolicy, DetectionEvent};
pub use format::BarcodeFormat;
