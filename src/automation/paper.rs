use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{round_to_chip, BetExecutor};
use crate::bot::strategy::BetDecision;

/// Dry-run executor: books the chip-rounded stake without touching a table.
pub struct PaperTable {
    chip_value: f64,
}

impl PaperTable {
    pub fn new(chip_value: f64) -> Self {
        PaperTable { chip_value }
    }
}

#[async_trait]
impl BetExecutor for PaperTable {
    fn name(&self) -> &str {
        "paper"
    }

    async fn place_bet(&self, decision: &BetDecision) -> Result<f64> {
        let amount = round_to_chip(decision.stake, self.chip_value);
        info!(
            "[DRY RUN] Would place {:.2} on {} – no real funds used",
            amount,
            decision.target.as_str()
        );
        Ok(amount)
    }
}
