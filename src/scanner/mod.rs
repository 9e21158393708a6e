mod controller;
mod events;
mod loop_worker;
mod state;

pub use controller::{Collaborators, ScanAgain, ScanController, TickOutcome};
pub use events::{CurrentScan, ScannerEvent};
pub use state::{ScanPhase, ScanStats, SessionState};
