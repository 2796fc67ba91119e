use chrono::{DateTime, Utc};
use serde::Serialize;

use super::outcome::Outcome;
use super::streak::{StreakState, StreakTracker, ZeroPolicy};
use super::EngineError;

/// Staking plan followed by a strategy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Multiply the stake by `multiplier` after every loss; watches both
    /// colour and parity runs.
    Martingale,
    /// Fibonacci stake ladder; watches both dimensions.
    Fibonacci,
    /// User-supplied stake ladder; watches both dimensions.
    Custom,
    /// Counter-streak on even/odd only.
    EvenOdd,
    /// Counter-streak on red/black only.
    RedBlack,
}

impl StrategyKind {
    pub fn parse(s: &str) -> Option<StrategyKind> {
        match s.trim().to_lowercase().as_str() {
            "martingale" => Some(StrategyKind::Martingale),
            "fibonacci" => Some(StrategyKind::Fibonacci),
            "custom" => Some(StrategyKind::Custom),
            "even_odd" | "even-odd" | "evenodd" => Some(StrategyKind::EvenOdd),
            "red_black" | "red-black" | "redblack" => Some(StrategyKind::RedBlack),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Martingale => "martingale",
            StrategyKind::Fibonacci => "fibonacci",
            StrategyKind::Custom => "custom",
            StrategyKind::EvenOdd => "even_odd",
            StrategyKind::RedBlack => "red_black",
        }
    }

    fn watches_color(self) -> bool {
        !matches!(self, StrategyKind::EvenOdd)
    }

    fn watches_parity(self) -> bool {
        !matches!(self, StrategyKind::RedBlack)
    }
}

/// Per-strategy tunables. Stakes here are theoretical; chip rounding happens
/// at the automation layer.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Stake at gale step 0.
    pub base_bet: f64,
    /// Recovery steps allowed after the entry bet. 0 = one bet per cycle.
    pub max_gales: u32,
    /// Stake multiplier per step (martingale and counter-streak kinds).
    pub multiplier: f64,
    /// Stake ladder in multiples of `base_bet` (custom kind only).
    pub custom_sequence: Vec<f64>,
    /// Consecutive same-type outcomes required before entering a cycle.
    pub streak_length: u32,
    pub zero_policy: ZeroPolicy,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.base_bet <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "base_bet must be positive".into(),
            ));
        }
        if self.streak_length == 0 {
            return Err(EngineError::InvalidConfig(
                "streak_length must be at least 1".into(),
            ));
        }
        match self.kind {
            StrategyKind::Martingale | StrategyKind::EvenOdd | StrategyKind::RedBlack => {
                // A multiplier of 1 or less can never recover earlier losses
                if self.multiplier <= 1.0 {
                    return Err(EngineError::InvalidConfig(
                        "multiplier must be greater than 1".into(),
                    ));
                }
            }
            StrategyKind::Custom => {
                if self.custom_sequence.is_empty() {
                    return Err(EngineError::InvalidConfig(
                        "custom strategy needs a non-empty stake sequence".into(),
                    ));
                }
                if self.custom_sequence.iter().any(|m| *m <= 0.0) {
                    return Err(EngineError::InvalidConfig(
                        "custom stake sequence entries must be positive".into(),
                    ));
                }
            }
            StrategyKind::Fibonacci => {}
        }
        Ok(())
    }
}

/// What a bet is riding on. Zero pays neither side of either target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BetTarget {
    Color(super::outcome::Color),
    Parity(super::outcome::Parity),
}

impl BetTarget {
    pub fn wins_on(&self, outcome: &Outcome) -> bool {
        if outcome.is_zero() {
            return false;
        }
        match self {
            BetTarget::Color(c) => outcome.color == *c,
            BetTarget::Parity(p) => outcome.parity == *p,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetTarget::Color(c) => c.as_str(),
            BetTarget::Parity(p) => p.as_str(),
        }
    }
}

/// A concrete bet request handed to the runtime for placement.
#[derive(Debug, Clone, Serialize)]
pub struct BetDecision {
    pub strategy: String,
    pub target: BetTarget,
    /// Theoretical stake; the executor rounds to the platform chip value.
    pub stake: f64,
    pub gale_step: u32,
    pub reason: String,
    pub keepalive: bool,
    pub decided_at: DateTime<Utc>,
}

/// Executor verdict for one placement attempt.
#[derive(Debug, Clone, Serialize)]
pub struct BetResult {
    pub success: bool,
    /// Chip-rounded amount actually on the table. Zero when placement failed.
    pub placed_amount: f64,
    pub error: Option<String>,
}

impl BetResult {
    pub fn placed(amount: f64) -> Self {
        BetResult {
            success: true,
            placed_amount: amount,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        BetResult {
            success: false,
            placed_amount: 0.0,
            error: Some(error.into()),
        }
    }
}

/// An in-flight betting cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Cycle {
    pub target: BetTarget,
    /// Current recovery step; 0 is the entry bet.
    pub gale_step: u32,
    /// Theoretical stake for the current step.
    pub stake: f64,
    /// Confirmed amount riding on the current step, if placement succeeded.
    pub pending: Option<f64>,
    /// Total confirmed money exposed across the cycle so far.
    pub total_staked: f64,
    /// Running net result of settled bets in this cycle.
    pub net: f64,
    pub entered_at: DateTime<Utc>,
}

/// Reason a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleEnd {
    Won,
    MaxGaleLoss,
    ZeroReset,
    /// Aborted by the risk guard before the next stake could be placed.
    Forced,
}

impl CycleEnd {
    pub fn is_win(self) -> bool {
        matches!(self, CycleEnd::Won)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleEnd::Won => "won",
            CycleEnd::MaxGaleLoss => "max_gale_loss",
            CycleEnd::ZeroReset => "zero_reset",
            CycleEnd::Forced => "forced",
        }
    }
}

/// Terminal summary of a finished cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub end: CycleEnd,
    pub final_step: u32,
    pub total_staked: f64,
    pub net: f64,
}

/// Everything a strategy engine did in response to one outcome. An outcome
/// never both settles a cycle and opens the next one.
#[derive(Debug, Default)]
pub struct StrategyStep {
    pub settled: Option<SettledBet>,
    pub cycle: Option<CycleReport>,
    pub decision: Option<BetDecision>,
}

/// One settled even-money bet.
#[derive(Debug, Clone, Serialize)]
pub struct SettledBet {
    pub target: BetTarget,
    pub amount: f64,
    pub won: bool,
    pub gale_step: u32,
}

/// Theoretical stake for a gale step under this config.
pub fn stake_for_step(config: &StrategyConfig, gale_step: u32) -> f64 {
    match config.kind {
        StrategyKind::Martingale | StrategyKind::EvenOdd | StrategyKind::RedBlack => {
            config.base_bet * config.multiplier.powi(gale_step as i32)
        }
        StrategyKind::Fibonacci => config.base_bet * fibonacci(gale_step + 1) as f64,
        StrategyKind::Custom => {
            // Clamp to the last ladder entry rather than panicking past the end
            let idx = (gale_step as usize).min(config.custom_sequence.len() - 1);
            config.base_bet * config.custom_sequence[idx]
        }
    }
}

/// Iterative Fibonacci with F(1) = F(2) = 1.
fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 1..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

/// One strategy's full state machine: streak watching, cycle entry and gale
/// progression.
///
/// The engine is pure with respect to money and I/O. It reports settlements
/// and emits decisions; the caller owns the balance, authorizes stakes and
/// confirms placements via [`StrategyEngine::confirm_bet`].
#[derive(Debug, Clone)]
pub struct StrategyEngine {
    config: StrategyConfig,
    tracker: StreakTracker,
    cycle: Option<Cycle>,
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let tracker = StreakTracker::new(config.zero_policy);
        Ok(StrategyEngine {
            config,
            tracker,
            cycle: None,
        })
    }

    pub fn name(&self) -> &'static str {
        self.config.kind.as_str()
    }

    pub fn kind(&self) -> StrategyKind {
        self.config.kind
    }

    pub fn cycle(&self) -> Option<&Cycle> {
        self.cycle.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.cycle.is_none()
    }

    pub fn streaks(&self) -> &StreakState {
        self.tracker.state()
    }

    /// Fold an outcome into streak state without any betting logic. Used
    /// while another strategy is active so this one stays warm for a switch.
    pub fn observe(&mut self, outcome: &Outcome) {
        self.tracker.update(outcome);
    }

    /// Process an outcome as the active strategy.
    pub fn on_result(&mut self, outcome: &Outcome) -> StrategyStep {
        let mut step = StrategyStep::default();

        // Neutral zeros are invisible: no streak update, no settlement. A bet
        // already on the table keeps riding; a failed placement is re-offered.
        if outcome.is_zero() && self.config.zero_policy == ZeroPolicy::Neutral {
            if let Some(cycle) = &self.cycle {
                if cycle.pending.is_none() {
                    step.decision = Some(self.reoffer_decision(cycle));
                }
            }
            return step;
        }

        self.tracker.update(outcome);

        if let Some(mut cycle) = self.cycle.take() {
            // Reset policy: zero wipes the streak context the cycle was built
            // on, so the cycle dies with it. Money on the table still settles
            // (zero loses every even-money bet).
            if outcome.is_zero() && self.config.zero_policy == ZeroPolicy::Reset {
                if let Some(amount) = cycle.pending.take() {
                    cycle.net -= amount;
                    step.settled = Some(SettledBet {
                        target: cycle.target,
                        amount,
                        won: false,
                        gale_step: cycle.gale_step,
                    });
                }
                step.cycle = Some(CycleReport {
                    end: CycleEnd::ZeroReset,
                    final_step: cycle.gale_step,
                    total_staked: cycle.total_staked,
                    net: cycle.net,
                });
                return step;
            }

            let Some(amount) = cycle.pending.take() else {
                // Placement never confirmed: the outcome passes with nothing
                // riding on it; offer the same step again.
                step.decision = Some(self.reoffer_decision(&cycle));
                self.cycle = Some(cycle);
                return step;
            };

            let won = cycle.target.wins_on(outcome);
            cycle.net += if won { amount } else { -amount };
            step.settled = Some(SettledBet {
                target: cycle.target,
                amount,
                won,
                gale_step: cycle.gale_step,
            });

            if won {
                step.cycle = Some(CycleReport {
                    end: CycleEnd::Won,
                    final_step: cycle.gale_step,
                    total_staked: cycle.total_staked,
                    net: cycle.net,
                });
                return step;
            }

            if cycle.gale_step >= self.config.max_gales {
                step.cycle = Some(CycleReport {
                    end: CycleEnd::MaxGaleLoss,
                    final_step: cycle.gale_step,
                    total_staked: cycle.total_staked,
                    net: cycle.net,
                });
                return step;
            }

            cycle.gale_step += 1;
            cycle.stake = stake_for_step(&self.config, cycle.gale_step);
            step.decision = Some(self.gale_decision(&cycle));
            self.cycle = Some(cycle);
            return step;
        }

        step.decision = self.entry_decision();
        step
    }

    /// Record the executor's verdict for the most recent decision.
    pub fn confirm_bet(&mut self, result: &BetResult) {
        if let Some(cycle) = &mut self.cycle {
            if result.success && result.placed_amount > 0.0 {
                cycle.pending = Some(result.placed_amount);
                cycle.total_staked += result.placed_amount;
            } else {
                cycle.pending = None;
            }
        }
    }

    /// Abort the active cycle, counting it as a loss. Used when the risk
    /// guard refuses the next stake mid-progression.
    pub fn force_resolve(&mut self, end: CycleEnd) -> Option<CycleReport> {
        let cycle = self.cycle.take()?;
        Some(CycleReport {
            end,
            final_step: cycle.gale_step,
            total_staked: cycle.total_staked,
            net: cycle.net,
        })
    }

    /// Drop cycle and streak state, e.g. on operator restart.
    pub fn reset(&mut self) {
        self.cycle = None;
        self.tracker.clear();
    }

    fn entry_decision(&mut self) -> Option<BetDecision> {
        let threshold = self.config.streak_length;
        let mut pick = None;

        // Colour runs take priority when a strategy watches both dimensions.
        if self.config.kind.watches_color() {
            if let Some((color, len)) = self.tracker.color_run() {
                if len >= threshold {
                    if let Some(opposite) = color.opposite() {
                        pick = Some((
                            BetTarget::Color(opposite),
                            format!("counter {} run of {}", color.as_str(), len),
                        ));
                    }
                }
            }
        }
        if pick.is_none() && self.config.kind.watches_parity() {
            if let Some((parity, len)) = self.tracker.parity_run() {
                if len >= threshold {
                    if let Some(opposite) = parity.opposite() {
                        pick = Some((
                            BetTarget::Parity(opposite),
                            format!("counter {} run of {}", parity.as_str(), len),
                        ));
                    }
                }
            }
        }

        let (target, reason) = pick?;
        let stake = stake_for_step(&self.config, 0);
        let now = Utc::now();
        self.cycle = Some(Cycle {
            target,
            gale_step: 0,
            stake,
            pending: None,
            total_staked: 0.0,
            net: 0.0,
            entered_at: now,
        });
        Some(BetDecision {
            strategy: self.name().to_string(),
            target,
            stake,
            gale_step: 0,
            reason,
            keepalive: false,
            decided_at: now,
        })
    }

    fn gale_decision(&self, cycle: &Cycle) -> BetDecision {
        BetDecision {
            strategy: self.name().to_string(),
            target: cycle.target,
            stake: cycle.stake,
            gale_step: cycle.gale_step,
            reason: format!("gale step {} of {}", cycle.gale_step, self.config.max_gales),
            keepalive: false,
            decided_at: Utc::now(),
        }
    }

    fn reoffer_decision(&self, cycle: &Cycle) -> BetDecision {
        BetDecision {
            strategy: self.name().to_string(),
            target: cycle.target,
            stake: cycle.stake,
            gale_step: cycle.gale_step,
            reason: format!("re-offer step {} after failed placement", cycle.gale_step),
            keepalive: false,
            decided_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::outcome::{classify, Color, Parity};
    use approx::assert_relative_eq;

    fn spin(n: i64) -> Outcome {
        classify(n).unwrap()
    }

    fn make_config(kind: StrategyKind) -> StrategyConfig {
        StrategyConfig {
            kind,
            base_bet: 10.0,
            max_gales: 2,
            multiplier: 2.0,
            custom_sequence: vec![1.0, 2.0, 4.0],
            streak_length: 3,
            zero_policy: ZeroPolicy::CountAsLoss,
        }
    }

    fn make_engine(kind: StrategyKind) -> StrategyEngine {
        StrategyEngine::new(make_config(kind)).unwrap()
    }

    /// Confirm the last decision as fully placed at its theoretical stake.
    fn confirm(engine: &mut StrategyEngine, decision: &BetDecision) {
        engine.confirm_bet(&BetResult::placed(decision.stake));
    }

    #[test]
    fn test_martingale_stake_progression() {
        let cfg = make_config(StrategyKind::Martingale);
        assert_relative_eq!(stake_for_step(&cfg, 0), 10.0, epsilon = 1e-9);
        assert_relative_eq!(stake_for_step(&cfg, 1), 20.0, epsilon = 1e-9);
        assert_relative_eq!(stake_for_step(&cfg, 2), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fibonacci_stake_progression() {
        let cfg = make_config(StrategyKind::Fibonacci);
        // Steps 0..=4 follow 1, 1, 2, 3, 5 times the base bet
        let expected = [10.0, 10.0, 20.0, 30.0, 50.0];
        for (step, want) in expected.iter().enumerate() {
            assert_relative_eq!(stake_for_step(&cfg, step as u32), *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_custom_stake_clamps_to_last_entry() {
        let cfg = make_config(StrategyKind::Custom);
        assert_relative_eq!(stake_for_step(&cfg, 1), 20.0, epsilon = 1e-9);
        assert_relative_eq!(stake_for_step(&cfg, 2), 40.0, epsilon = 1e-9);
        assert_relative_eq!(stake_for_step(&cfg, 9), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_config_validation() {
        let mut cfg = make_config(StrategyKind::Martingale);
        cfg.base_bet = 0.0;
        assert!(StrategyEngine::new(cfg).is_err());

        let mut cfg = make_config(StrategyKind::Custom);
        cfg.custom_sequence.clear();
        assert!(StrategyEngine::new(cfg).is_err());

        let mut cfg = make_config(StrategyKind::Martingale);
        cfg.streak_length = 0;
        assert!(StrategyEngine::new(cfg).is_err());

        // A flat multiplier can never recover losses
        let mut cfg = make_config(StrategyKind::Martingale);
        cfg.multiplier = 1.0;
        assert!(StrategyEngine::new(cfg).is_err());

        // Fibonacci ignores the multiplier entirely
        let mut cfg = make_config(StrategyKind::Fibonacci);
        cfg.multiplier = 1.0;
        assert!(StrategyEngine::new(cfg).is_ok());
    }

    #[test]
    fn test_entry_after_streak_threshold() {
        let mut engine = make_engine(StrategyKind::EvenOdd);
        // Two odds: not enough yet
        assert!(engine.on_result(&spin(19)).decision.is_none());
        assert!(engine.on_result(&spin(21)).decision.is_none());
        // Third odd triggers a counter bet on even at the base stake
        let step = engine.on_result(&spin(5));
        let decision = step.decision.expect("entry decision");
        assert_eq!(decision.target, BetTarget::Parity(Parity::Even));
        assert_relative_eq!(decision.stake, 10.0, epsilon = 1e-9);
        assert_eq!(decision.gale_step, 0);
        assert!(!decision.keepalive);
        assert!(!engine.is_idle());
    }

    #[test]
    fn test_entry_fires_exactly_once_on_long_run() {
        let mut cfg = make_config(StrategyKind::EvenOdd);
        cfg.streak_length = 6;
        let mut engine = StrategyEngine::new(cfg).unwrap();
        // Five evens: still below the threshold
        for n in [2, 12, 4, 14, 6] {
            assert!(engine.on_result(&spin(n)).decision.is_none());
        }
        // The sixth even fires the entry, targeting odd
        let step = engine.on_result(&spin(8));
        let decision = step.decision.expect("entry on the sixth even");
        assert_eq!(decision.target, BetTarget::Parity(Parity::Odd));
        assert_eq!(decision.gale_step, 0);
        confirm(&mut engine, &decision);
        // A seventh even resolves the pending bet instead of re-entering
        let step = engine.on_result(&spin(10));
        assert!(step.settled.is_some());
        assert!(step.decision.unwrap().gale_step == 1);
    }

    #[test]
    fn test_red_black_ignores_parity_runs() {
        let mut engine = make_engine(StrategyKind::RedBlack);
        // 19, 21, 5: three odds but mixed enough colours? 19/21/5 are all red,
        // so use alternating colours with same parity instead.
        // 9 red odd, 11 black odd, 19 red odd -> parity run 3, colour run 1
        engine.on_result(&spin(9));
        engine.on_result(&spin(11));
        let step = engine.on_result(&spin(19));
        assert!(step.decision.is_none());
    }

    #[test]
    fn test_colour_run_takes_priority_for_martingale() {
        let mut engine = make_engine(StrategyKind::Martingale);
        // 19, 21, 5 are all red and all odd: both runs hit the threshold
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let step = engine.on_result(&spin(5));
        let decision = step.decision.expect("entry decision");
        assert_eq!(decision.target, BetTarget::Color(Color::Black));
    }

    #[test]
    fn test_gale_progression_and_recovery_win() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);

        // Red again: entry bet on black loses, stake doubles
        let step = engine.on_result(&spin(3));
        let settled = step.settled.expect("settlement");
        assert!(!settled.won);
        assert_relative_eq!(settled.amount, 10.0, epsilon = 1e-9);
        assert!(step.cycle.is_none());
        let gale = step.decision.expect("gale decision");
        assert_eq!(gale.gale_step, 1);
        assert_relative_eq!(gale.stake, 20.0, epsilon = 1e-9);
        confirm(&mut engine, &gale);

        // Black: recovery win nets +base_bet for the cycle
        let step = engine.on_result(&spin(10));
        assert!(step.settled.as_ref().unwrap().won);
        let report = step.cycle.expect("cycle report");
        assert_eq!(report.end, CycleEnd::Won);
        assert_eq!(report.final_step, 1);
        assert_relative_eq!(report.net, 10.0, epsilon = 1e-9);
        assert_relative_eq!(report.total_staked, 30.0, epsilon = 1e-9);
        // Resolution never opens a new cycle on the same outcome
        assert!(step.decision.is_none());
        assert!(engine.is_idle());
    }

    #[test]
    fn test_max_gale_exhaustion() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);

        // Three red outcomes: steps 0, 1, 2 all lose; step 2 is the last
        let step = engine.on_result(&spin(3));
        confirm(&mut engine, &step.decision.unwrap());
        let step = engine.on_result(&spin(7));
        confirm(&mut engine, &step.decision.unwrap());
        let step = engine.on_result(&spin(9));

        let report = step.cycle.expect("cycle report");
        assert_eq!(report.end, CycleEnd::MaxGaleLoss);
        assert_eq!(report.final_step, 2);
        // 10 + 20 + 40 all lost
        assert_relative_eq!(report.net, -70.0, epsilon = 1e-9);
        assert_relative_eq!(report.total_staked, 70.0, epsilon = 1e-9);
        assert!(step.decision.is_none());
        assert!(engine.is_idle());
    }

    #[test]
    fn test_zero_counts_as_loss_mid_cycle() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);

        let step = engine.on_result(&spin(0));
        let settled = step.settled.expect("zero settles the pending bet");
        assert!(!settled.won);
        let gale = step.decision.expect("gale continues after zero loss");
        assert_eq!(gale.gale_step, 1);
    }

    #[test]
    fn test_zero_neutral_keeps_bet_riding() {
        let mut cfg = make_config(StrategyKind::Martingale);
        cfg.zero_policy = ZeroPolicy::Neutral;
        let mut engine = StrategyEngine::new(cfg).unwrap();
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);

        // Zero is invisible: nothing settles, nothing is decided
        let step = engine.on_result(&spin(0));
        assert!(step.settled.is_none());
        assert!(step.cycle.is_none());
        assert!(step.decision.is_none());

        // The bet is still riding and wins on the next black
        let step = engine.on_result(&spin(10));
        assert!(step.settled.as_ref().unwrap().won);
        assert_eq!(step.cycle.unwrap().end, CycleEnd::Won);
    }

    #[test]
    fn test_zero_reset_force_resolves_cycle() {
        let mut cfg = make_config(StrategyKind::Martingale);
        cfg.zero_policy = ZeroPolicy::Reset;
        let mut engine = StrategyEngine::new(cfg).unwrap();
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);

        let step = engine.on_result(&spin(0));
        // The placed stake is gone and the cycle is dead
        assert!(!step.settled.as_ref().unwrap().won);
        let report = step.cycle.expect("forced resolution");
        assert_eq!(report.end, CycleEnd::ZeroReset);
        assert_relative_eq!(report.net, -10.0, epsilon = 1e-9);
        assert!(step.decision.is_none());
        assert!(engine.is_idle());
        // Streak context is gone too
        assert!(engine.streaks().color.is_none());
    }

    #[test]
    fn test_failed_placement_reoffers_same_step() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        engine.confirm_bet(&BetResult::failed("automation timeout"));

        // Next outcome settles nothing; the same step is offered again
        let step = engine.on_result(&spin(10));
        assert!(step.settled.is_none());
        assert!(step.cycle.is_none());
        let reoffer = step.decision.expect("re-offer");
        assert_eq!(reoffer.gale_step, entry.gale_step);
        assert_relative_eq!(reoffer.stake, entry.stake, epsilon = 1e-9);
        assert_eq!(reoffer.target, entry.target);
    }

    #[test]
    fn test_exposure_uses_placed_amount_not_theoretical() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let _ = engine.on_result(&spin(5)).decision.unwrap();
        // Chip rounding placed less than the theoretical stake
        engine.confirm_bet(&BetResult::placed(9.5));

        let step = engine.on_result(&spin(3));
        assert_relative_eq!(step.settled.unwrap().amount, 9.5, epsilon = 1e-9);
        assert_relative_eq!(engine.cycle().unwrap().total_staked, 9.5, epsilon = 1e-9);
    }

    #[test]
    fn test_force_resolve() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);
        let step = engine.on_result(&spin(3));
        confirm(&mut engine, &step.decision.unwrap());

        let report = engine.force_resolve(CycleEnd::Forced).expect("open cycle");
        assert_eq!(report.end, CycleEnd::Forced);
        assert_eq!(report.final_step, 1);
        assert_relative_eq!(report.net, -10.0, epsilon = 1e-9);
        assert!(engine.is_idle());
        assert!(engine.force_resolve(CycleEnd::Forced).is_none());
    }

    #[test]
    fn test_no_entry_while_cycle_active() {
        let mut engine = make_engine(StrategyKind::Martingale);
        engine.on_result(&spin(19));
        engine.on_result(&spin(21));
        let entry = engine.on_result(&spin(5)).decision.unwrap();
        confirm(&mut engine, &entry);

        // More reds keep the colour run past the threshold, but the active
        // cycle owns the engine until it resolves
        let step = engine.on_result(&spin(3));
        assert_eq!(step.decision.unwrap().reason, "gale step 1 of 2");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(StrategyKind::parse("martingale"), Some(StrategyKind::Martingale));
        assert_eq!(StrategyKind::parse("even_odd"), Some(StrategyKind::EvenOdd));
        assert_eq!(StrategyKind::parse("RED-BLACK"), Some(StrategyKind::RedBlack));
        assert_eq!(StrategyKind::parse("kelly"), None);
    }
}
