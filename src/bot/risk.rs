use serde::Serialize;

use super::strategy::BetDecision;
use super::EngineError;

/// Session bankroll with peak/trough watermarks.
#[derive(Debug, Clone, Serialize)]
pub struct Balance {
    pub initial: f64,
    pub current: f64,
    pub peak: f64,
    pub trough: f64,
}

impl Balance {
    pub fn new(initial: f64) -> Self {
        Balance {
            initial,
            current: initial,
            peak: initial,
            trough: initial,
        }
    }

    /// Apply one settlement delta and update the watermarks.
    pub fn apply(&mut self, delta: f64) {
        self.current += delta;
        if self.current > self.peak {
            self.peak = self.current;
        }
        if self.current < self.trough {
            self.trough = self.current;
        }
    }

    pub fn net(&self) -> f64 {
        self.current - self.initial
    }
}

/// Hard session limits. A limit of zero disables that check.
#[derive(Debug, Clone, Serialize)]
pub struct RiskLimits {
    /// Stop once the session is down this much from the initial balance.
    pub stop_loss: f64,
    /// Stop after this many consecutive losing bets.
    pub stop_loss_count: u32,
    /// Stop once the session is up this much.
    pub stop_win: f64,
    /// Stop after this many consecutive winning bets.
    pub stop_win_count: u32,
    /// Fraction of the current balance that must survive any single stake.
    pub guarantee_fund: f64,
}

impl RiskLimits {
    fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..1.0).contains(&self.guarantee_fund) {
            return Err(EngineError::InvalidConfig(
                "guarantee_fund must be in [0, 1)".into(),
            ));
        }
        if self.stop_loss < 0.0 || self.stop_win < 0.0 {
            return Err(EngineError::InvalidConfig(
                "stop limits must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Why the session was halted. Terminal until an operator restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    StopLossMoney,
    StopLossCount,
    StopWinMoney,
    StopWinCount,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::StopLossMoney => "stop_loss_money",
            StopReason::StopLossCount => "stop_loss_count",
            StopReason::StopWinMoney => "stop_win_money",
            StopReason::StopWinCount => "stop_win_count",
        }
    }
}

/// Verdict on a single bet decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow,
    /// Stake refused; an active cycle must force-resolve as a loss.
    Deny(String),
    /// The session already hit a stop limit.
    Stopped(StopReason),
}

/// Pre-bet authorization and post-settlement stop evaluation.
///
/// The guard never mutates the balance; it only reads it. The first limit
/// crossed latches the guard and every later `authorize` reports it.
#[derive(Debug, Clone)]
pub struct RiskGuard {
    limits: RiskLimits,
    consecutive_losses: u32,
    consecutive_wins: u32,
    stopped: Option<StopReason>,
}

impl RiskGuard {
    pub fn new(limits: RiskLimits) -> Result<Self, EngineError> {
        limits.validate()?;
        Ok(RiskGuard {
            limits,
            consecutive_losses: 0,
            consecutive_wins: 0,
            stopped: None,
        })
    }

    pub fn stopped(&self) -> Option<StopReason> {
        self.stopped
    }

    /// Gate one decision against the guarantee fund.
    pub fn authorize(&self, decision: &BetDecision, balance: &Balance) -> Verdict {
        if let Some(reason) = self.stopped {
            return Verdict::Stopped(reason);
        }
        let reserve = balance.current * self.limits.guarantee_fund;
        if balance.current - decision.stake < reserve {
            return Verdict::Deny(format!(
                "stake {:.2} would cut balance {:.2} below the {:.2} guarantee fund",
                decision.stake, balance.current, reserve
            ));
        }
        Verdict::Allow
    }

    /// Fold one settled bet into the stop counters and check every limit.
    /// Returns the reason the moment a limit is crossed.
    pub fn after_settlement(&mut self, won: bool, balance: &Balance) -> Option<StopReason> {
        if won {
            self.consecutive_wins += 1;
            self.consecutive_losses = 0;
        } else {
            self.consecutive_losses += 1;
            self.consecutive_wins = 0;
        }

        let l = &self.limits;
        let triggered = if l.stop_loss > 0.0 && balance.current <= balance.initial - l.stop_loss {
            Some(StopReason::StopLossMoney)
        } else if l.stop_loss_count > 0 && self.consecutive_losses >= l.stop_loss_count {
            Some(StopReason::StopLossCount)
        } else if l.stop_win > 0.0 && balance.net() >= l.stop_win {
            Some(StopReason::StopWinMoney)
        } else if l.stop_win_count > 0 && self.consecutive_wins >= l.stop_win_count {
            Some(StopReason::StopWinCount)
        } else {
            None
        };

        if triggered.is_some() && self.stopped.is_none() {
            self.stopped = triggered;
        }
        triggered
    }

    /// Operator restart: clear the latch and the consecutive counters.
    pub fn reset(&mut self) {
        self.consecutive_losses = 0;
        self.consecutive_wins = 0;
        self.stopped = None;
    }
}
