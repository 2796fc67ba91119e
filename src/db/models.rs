use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed wheel spin as reported by an outcome provider.
///
/// `number` is authoritative; the engine re-derives colour and parity from it.
/// Detector metadata (claimed colour, confidence, recognition method) is kept
/// for the journal only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub id: Option<i64>,
    /// Provider round ID; spins are deduplicated on this
    pub round_id: String,
    /// Winning pocket, 0-36
    pub number: i64,
    /// Colour as claimed by the detector (may disagree with `number`)
    pub detected_color: Option<String>,
    /// Detector confidence (0.0-1.0)
    pub confidence: Option<f64>,
    /// e.g. "ocr", "pixel", "dom"
    pub method: Option<String>,
    /// Provider name: "simulator", "detector", ...
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

/// A journaled bet and its settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRow {
    pub id: Option<i64>,
    /// Strategy that produced the decision ("keepalive" for maintenance bets)
    pub strategy: String,
    /// "red" | "black" | "even" | "odd"
    pub target: String,
    /// Theoretical stake requested by the strategy
    pub stake: f64,
    /// Chip-rounded amount actually placed
    pub placed_amount: f64,
    pub gale_step: i64,
    pub keepalive: bool,
    pub reason: String,
    /// "pending" | "won" | "lost"
    pub status: String,
    pub dry_run: bool,
    pub placed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Winning pocket of the settling spin
    pub settled_number: Option<i64>,
    pub pnl: Option<f64>,
}

/// A journaled engine event (cycle end, stop, strategy switch, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: Option<i64>,
    pub kind: String,
    /// Event fields serialized as JSON
    pub payload: String,
    pub recorded_at: DateTime<Utc>,
}
