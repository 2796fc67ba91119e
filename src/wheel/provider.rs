use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::SpinOutcome;

/// Trait that every wheel outcome provider must implement.
#[async_trait]
pub trait WheelProvider: Send + Sync {
    /// Return the latest completed spin, if one is available. The monitor
    /// deduplicates by round ID, so reporting the same spin twice is harmless.
    async fn latest_spin(&self) -> Result<Option<SpinOutcome>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
