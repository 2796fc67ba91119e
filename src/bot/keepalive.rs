use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;

use super::outcome::Color;
use super::strategy::{BetDecision, BetTarget};

/// Emits a minimal maintenance bet when the session has been idle long enough
/// that the platform might close it.
///
/// A stake of zero disables the scheduler. Firing re-arms the idle window
/// immediately, whether or not the bet is later placed successfully.
#[derive(Debug)]
pub struct KeepaliveScheduler {
    stake: f64,
    idle_after: Duration,
    last_activity: Instant,
}

impl KeepaliveScheduler {
    pub fn new(stake: f64, idle_after: Duration) -> Self {
        KeepaliveScheduler {
            stake,
            idle_after,
            last_activity: Instant::now(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.stake > 0.0
    }

    /// Real betting activity pushes the idle window out.
    pub fn note_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Produce a maintenance bet if the idle window elapsed and nothing is on
    /// the table.
    pub fn poll<R: Rng>(&mut self, now: Instant, busy: bool, rng: &mut R) -> Option<BetDecision> {
        if !self.enabled() || busy {
            return None;
        }
        if self.idle_for(now) < self.idle_after {
            return None;
        }
        self.last_activity = now;
        let color = if rng.gen_bool(0.5) {
            Color::Red
        } else {
            Color::Black
        };
        Some(BetDecision {
            strategy: "keepalive".to_string(),
            target: BetTarget::Color(color),
            stake: self.stake,
            gale_step: 0,
            reason: format!("session idle for {}s", self.idle_after.as_secs()),
            keepalive: true,
            decided_at: Utc::now(),
        })
    }
}
