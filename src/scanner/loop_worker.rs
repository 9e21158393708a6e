use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::{ScanController, TickOutcome};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Drives ticks for one scan session. Exits on cancellation, confirmation,
/// or once `generation` is no longer the controller's current session.
pub async fn scan_loop(
    controller: ScanController,
    generation: u64,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                log_info!("scan loop {} shutting down", generation);
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                match controller.tick_in(generation).await {
                    TickOutcome::Continue => {}
                    TickOutcome::Confirmed(record) => {
                        log_info!("scan loop confirmed {} after {} tick(s)", record.code, ticks);
                        break;
                    }
                    TickOutcome::Stopped => {
                        log_debug!("scan loop {} stopped after {} tick(s)", generation, ticks);
                        break;
                    }
                }
            }
        }
    }
}
