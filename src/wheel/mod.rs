pub mod provider;
pub mod simulator;
pub mod websocket;

pub use provider::WheelProvider;
pub use simulator::SimulatedWheel;
pub use websocket::{DetectorFeed, DetectorFeedConfig};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::db::models::SpinOutcome;

/// Spawns a background task that polls the wheel provider at the configured
/// interval and sends each **new** spin through the returned channel.
///
/// Providers report their latest round until the next one lands; the monitor
/// forwards each round exactly once.
pub fn start_wheel_monitor(
    provider: Arc<dyn WheelProvider>,
    poll_interval: Duration,
) -> mpsc::Receiver<SpinOutcome> {
    let (tx, rx) = mpsc::channel(256);

    tokio::spawn(async move {
        info!(
            "Wheel monitor started (provider: {}, interval={:?})",
            provider.name(),
            poll_interval
        );

        let provider_timeout = poll_interval.max(Duration::from_secs(2));
        let mut last_round: Option<String> = None;
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let polled = tokio::time::timeout(provider_timeout, provider.latest_spin()).await;
            let spin = match polled {
                Ok(Ok(spin)) => spin,
                Ok(Err(e)) => {
                    warn!("Provider '{}' failed: {}", provider.name(), e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Provider '{}' timed out after {:?}",
                        provider.name(),
                        provider_timeout
                    );
                    continue;
                }
            };
            let Some(spin) = spin else { continue };
            if last_round.as_deref() == Some(spin.round_id.as_str()) {
                continue;
            }
            last_round = Some(spin.round_id.clone());

            info!(
                "Spin observed: {} (round {}, source {})",
                spin.number, spin.round_id, spin.source
            );
            // Log when spins are dropped instead of silently ignoring
            if let Err(e) = tx.try_send(spin) {
                error!("Spin channel full, spin DROPPED: {}", e);
            }
        }
    });

    rx
}
