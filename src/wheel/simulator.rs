use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::provider::WheelProvider;
use crate::db::models::SpinOutcome;

/// Simulated European single-zero wheel. Produces a uniform 0-36 pocket every
/// `spin_interval`; the dry-run stand-in for a real detector feed.
pub struct SimulatedWheel {
    spin_interval: Duration,
    state: Mutex<SimState>,
}

struct SimState {
    rng: StdRng,
    round: u64,
    next_spin_at: Instant,
}

impl SimulatedWheel {
    pub fn new(spin_interval: Duration) -> Self {
        Self::with_rng(spin_interval, StdRng::from_entropy())
    }

    /// Seeded constructor for deterministic tests.
    pub fn with_rng(spin_interval: Duration, rng: StdRng) -> Self {
        SimulatedWheel {
            spin_interval,
            state: Mutex::new(SimState {
                rng,
                round: 0,
                // First spin is available immediately
                next_spin_at: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl WheelProvider for SimulatedWheel {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn latest_spin(&self) -> Result<Option<SpinOutcome>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if now < state.next_spin_at {
            return Ok(None);
        }
        state.next_spin_at = now + self.spin_interval;
        state.round += 1;
        let number: i64 = state.rng.gen_range(0..=36);
        Ok(Some(SpinOutcome {
            id: None,
            round_id: format!("sim-{}", state.round),
            number,
            detected_color: None,
            confidence: None,
            method: None,
            source: "simulator".to_string(),
            observed_at: Utc::now(),
        }))
    }
}
