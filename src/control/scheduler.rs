use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::control::calibration::CalibrationRunner;

/// Runs calibration cycles on a fixed interval until `shutdown` fires. The
/// first cycle runs immediately; a cycle that overruns skips missed ticks.
pub fn spawn_calibration_loop(
    runner: Arc<CalibrationRunner>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            target: "calibration",
            interval_secs = interval.as_secs(),
            "calibration_loop_started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    runner.run_cycle(OffsetDateTime::now_utc()).await;
                }
            }
        }

        info!(target: "calibration", "calibration_loop_stopped");
    })
}
