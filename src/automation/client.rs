use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::{round_to_chip, BetExecutor};
use crate::bot::strategy::BetDecision;

/// Client for the browser-automation service that clicks bets onto the live
/// table. The service exposes a small HTTP API; `POST /bet` drops chips on an
/// even-money field.
#[derive(Clone)]
pub struct AutomationClient {
    http: Client,
    base_url: String,
    chip_value: f64,
}

impl AutomationClient {
    pub fn new(base_url: &str, chip_value: f64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(AutomationClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            chip_value,
        })
    }
}

#[async_trait]
impl BetExecutor for AutomationClient {
    fn name(&self) -> &str {
        "automation"
    }

    async fn place_bet(&self, decision: &BetDecision) -> Result<f64> {
        let amount = round_to_chip(decision.stake, self.chip_value);

        info!(
            "Placing bet: {:.2} on {} (requested {:.2}, step {})",
            amount,
            decision.target.as_str(),
            decision.stake,
            decision.gale_step
        );

        let order = serde_json::json!({
            "target": decision.target.as_str(),
            "amount": amount,
            "strategy": decision.strategy,
        });

        let url = format!("{}/bet", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&order)
            .send()
            .await
            .context("Automation service request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Bet placement failed {}: {}", status, body);
        }

        // The service may echo the amount it actually managed to place;
        // an empty 200 body means our rounded amount went on as-is
        let body = resp.text().await.unwrap_or_default();
        let placed = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["placed_amount"].as_f64())
            .unwrap_or(amount);

        debug!("Automation confirmed {:.2} on the table", placed);
        Ok(placed)
    }
}
