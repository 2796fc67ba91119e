//! WebSocket detector feed for real-time wheel outcomes.
//!
//! A detector service watches the table (OCR, pixel sampling or DOM scraping)
//! and pushes each settled round over a WebSocket as it lands — no scraping
//! or polling delay on our side.
//!
//! Architecture:
//! ```text
//!  Detector ──push──▶ DetectorFeed (background task)
//!                        │  parses messages → SpinOutcome
//!                        │  stores the newest spin
//!                        ▼
//!            WheelProvider::latest_spin()
//!                reads the slot (tokio RwLock) — no network call
//! ```
//!
//! The pocket number is the only field the engine trusts; claimed colour,
//! confidence and recognition method ride along for the journal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use url::Url;

use super::provider::WheelProvider;
use crate::db::models::SpinOutcome;

/// Configuration for the detector WebSocket feed.
pub struct DetectorFeedConfig {
    /// Display name for logging
    pub name: String,
    /// WebSocket URL to connect to (ws:// or wss://)
    pub url: String,
    /// Optional subscription message to send after connecting
    pub subscribe_message: Option<String>,
    /// Seconds between client-side ping frames
    pub ping_interval_secs: u64,
}

/// Push-based wheel provider fed by the detector service.
///
/// The background task maintains a persistent connection with auto-reconnect;
/// `latest_spin()` returns the newest round from shared memory.
pub struct DetectorFeed {
    name: String,
    latest: Arc<RwLock<Option<SpinOutcome>>>,
}

impl DetectorFeed {
    /// Validate the URL and spawn the background listener.
    pub fn new(config: DetectorFeedConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .with_context(|| format!("invalid detector URL '{}'", config.url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            anyhow::bail!(
                "detector URL must use ws:// or wss://, got '{}'",
                url.scheme()
            );
        }

        let latest: Arc<RwLock<Option<SpinOutcome>>> = Arc::new(RwLock::new(None));
        let slot = Arc::clone(&latest);
        let name = config.name.clone();
        let subscribe = config.subscribe_message;
        let ping_interval_secs = config.ping_interval_secs;

        tokio::spawn(async move {
            ws_connection_loop(
                &name,
                url.as_str(),
                subscribe.as_deref(),
                slot,
                ping_interval_secs,
            )
            .await;
        });

        Ok(DetectorFeed {
            name: config.name,
            latest,
        })
    }
}

#[async_trait]
impl WheelProvider for DetectorFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_spin(&self) -> Result<Option<SpinOutcome>> {
        let slot = self.latest.read().await;
        Ok(slot.clone())
    }
}

/// Persistent WebSocket connection loop with auto-reconnect and exponential
/// backoff.
async fn ws_connection_loop(
    name: &str,
    url: &str,
    subscribe_msg: Option<&str>,
    latest: Arc<RwLock<Option<SpinOutcome>>>,
    ping_interval_secs: u64,
) {
    let mut backoff_secs = 1u64;
    let max_backoff = 30u64;

    loop {
        info!("[{}] Connecting to detector: {}", name, url);

        match tokio_tungstenite::connect_async(url).await {
            Ok((ws_stream, _response)) => {
                info!("[{}] Detector connected", name);
                backoff_secs = 1;

                let (mut write, mut read) = ws_stream.split();

                if let Some(sub_msg) = subscribe_msg {
                    if let Err(e) = write.send(Message::Text(sub_msg.to_string())).await {
                        error!("[{}] Failed to send subscribe message: {}", name, e);
                        continue;
                    }
                    info!("[{}] Subscription message sent", name);
                }

                let mut ping_interval =
                    tokio::time::interval(std::time::Duration::from_secs(ping_interval_secs));

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    // Some detector builds ping in text frames
                                    if text.trim() == "ping" {
                                        let _ = write.send(Message::Text("pong".to_string())).await;
                                        continue;
                                    }
                                    if let Some(spin) = parse_detector_message(&text) {
                                        let mut slot = latest.write().await;
                                        *slot = Some(spin);
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    let _ = write.send(Message::Pong(data)).await;
                                }
                                Some(Ok(Message::Close(_))) => {
                                    warn!("[{}] Detector closed WebSocket", name);
                                    break;
                                }
                                Some(Err(e)) => {
                                    error!("[{}] WebSocket error: {}", name, e);
                                    break;
                                }
                                None => {
                                    warn!("[{}] WebSocket stream ended", name);
                                    break;
                                }
                                _ => {}
                            }
                        }
                        _ = ping_interval.tick() => {
                            if let Err(e) = write.send(Message::Ping(vec![])).await {
                                error!("[{}] Ping failed: {}", name, e);
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                error!("[{}] Detector connection failed: {}", name, e);
            }
        }

        warn!("[{}] Reconnecting in {}s...", name, backoff_secs);
        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
        backoff_secs = (backoff_secs * 2).min(max_backoff);
    }
}

/// Parse one detector message into a spin.
///
/// Expected shape, allowing for some variation between detector builds:
/// ```json
/// {"type":"outcome","number":17,"color":"black","confidence":0.98,
///  "method":"ocr","round_id":"r-4812"}
/// ```
/// Messages with another `type` (heartbeats, status) and numbers outside
/// 0-36 are dropped. Some builds wrap the payload in a `data` object or send
/// the number as a string; both are accepted.
pub fn parse_detector_message(text: &str) -> Option<SpinOutcome> {
    let Ok(val) = serde_json::from_str::<serde_json::Value>(text) else {
        return None;
    };

    if let Some(kind) = val.get("type").and_then(|t| t.as_str()) {
        if !matches!(kind, "outcome" | "result" | "spin") {
            return None;
        }
    }

    // Some builds nest the payload under "data"
    let ev = val.get("data").unwrap_or(&val);

    let number = field_as_i64(ev, "number").or_else(|| field_as_i64(ev, "result"))?;
    if !(0..=36).contains(&number) {
        warn!("Detector reported pocket {} outside 0-36, dropped", number);
        return None;
    }

    let round_id = ev
        .get("round_id")
        .and_then(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .or_else(|| v.as_u64().map(|n| n.to_string()))
        })
        // No round ID: synthesize one so deduplication still works
        .unwrap_or_else(|| format!("t-{}", Utc::now().timestamp_millis()));

    Some(SpinOutcome {
        id: None,
        round_id,
        number,
        detected_color: ev
            .get("color")
            .and_then(|v| v.as_str())
            .map(|s| s.to_lowercase()),
        confidence: ev.get("confidence").and_then(|v| v.as_f64()),
        method: ev
            .get("method")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        source: "detector".to_string(),
        observed_at: Utc::now(),
    })
}

/// Read an integer field that may arrive as a number or a numeric string.
fn field_as_i64(val: &serde_json::Value, key: &str) -> Option<i64> {
    let v = val.get(key)?;
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
