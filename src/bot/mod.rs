pub mod engine;
pub mod keepalive;
pub mod manager;
pub mod outcome;
pub mod risk;
pub mod strategy;
pub mod streak;

pub use engine::EngineContext;

use thiserror::Error;

/// Typed failures surfaced by engine construction and outcome classification.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The wheel reported a number outside the single-zero layout.
    #[error("invalid wheel number {0}: expected 0..=36")]
    InvalidOutcome(i64),
    /// A strategy or risk parameter that can never produce a valid bet.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
