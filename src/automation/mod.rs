pub mod client;
pub mod paper;

pub use client::AutomationClient;
pub use paper::PaperTable;

use anyhow::Result;
use async_trait::async_trait;

use crate::bot::strategy::BetDecision;

/// Trait that every bet executor must implement.
#[async_trait]
pub trait BetExecutor: Send + Sync {
    /// Try to put the decision's stake on the table. Returns the chip-rounded
    /// amount actually placed; the engine books exposure from this, not from
    /// the requested stake.
    async fn place_bet(&self, decision: &BetDecision) -> Result<f64>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Round a theoretical stake to what the platform chips can express.
///
/// Rounds down to a whole number of chips but never below one chip, so a
/// positive stake always stays on the table. The epsilon keeps float error
/// like `20.0 / 0.1` landing just under a whole chip count from eating a
/// chip.
pub fn round_to_chip(stake: f64, chip_value: f64) -> f64 {
    if chip_value <= 0.0 {
        return stake;
    }
    let chips = ((stake / chip_value) + 1e-9).floor().max(1.0);
    chips * chip_value
}
