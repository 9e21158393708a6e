pub mod audio;
pub mod camera;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod detection;
pub mod error;
pub mod history;
pub mod product;
pub mod scanner;
pub mod settings;
pub mod storage;
mod utils;

pub use config::{ScanDriver, ScannerConfig};
pub use detection::BarcodeFormat;
pub use error::{CameraError, LookupError, PersistenceError, ScanError};
pub use history::{ScanRecord, ScanSource};
pub use product::{ProductCard, ProductInfo};
pub use scanner::{
    Collaborators, CurrentScan, ScanAgain, ScanController, ScanPhase, ScannerEvent, SessionState,
};
pub use settings::ScannerSettings;

/// Initialize logging (reads RUST_LOG env var). `debug` lowers the default
/// level so per-frame decode chatter shows up.
pub fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // A second call (tests, embedding apps) keeps the first logger.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
