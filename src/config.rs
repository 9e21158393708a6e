use std::time::Duration;

use log::warn;

use crate::{history::DEFAULT_HISTORY_CAPACITY, product::openfoodfacts::DEFAULT_BASE_URL};

/// How the scan loop is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDriver {
    /// A tokio task ticks at this period until cancelled.
    Interval(Duration),
    /// Nothing is spawned; the caller invokes `ScanController::tick`.
    Manual,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub driver: ScanDriver,
    pub camera_start_timeout: Duration,
    pub history_capacity: usize,
    pub lookup_base_url: String,
    pub lookup_timeout: Duration,
    pub debug: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            driver: ScanDriver::Interval(Duration::from_millis(100)),
            camera_start_timeout: Duration::from_secs(5),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            lookup_base_url: DEFAULT_BASE_URL.to_string(),
            lookup_timeout: Duration::from_secs(10),
            debug: false,
        }
    }
}

impl ScannerConfig {
    /// Defaults overridden by `CODESCAN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.debug = lookup("CODESCAN_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if config.debug {
            config.driver = ScanDriver::Interval(Duration::from_millis(33));
        }

        if let Some(ms) = parse_ms(&lookup, "CODESCAN_FRAME_INTERVAL_MS") {
            config.driver = ScanDriver::Interval(ms);
        }
        if let Some(ms) = parse_ms(&lookup, "CODESCAN_CAMERA_TIMEOUT_MS") {
            config.camera_start_timeout = ms;
        }
        if let Some(url) = lookup("CODESCAN_LOOKUP_URL").filter(|url| !url.trim().is_empty()) {
            config.lookup_base_url = url;
        }

        config
    }
}

fn parse_ms<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            warn!("{key} must be greater than zero; ignoring");
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            warn!("{key}={raw:?} is not a number of milliseconds: {err}");
            None
        }
    }
}
