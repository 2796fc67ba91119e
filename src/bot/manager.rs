use std::collections::VecDeque;

use serde::Serialize;
use tracing::info;

use super::outcome::Outcome;
use super::strategy::{BetResult, CycleEnd, CycleReport, StrategyEngine, StrategyStep};
use super::EngineError;

/// Sliding window length for the recent-form component of the score.
const RECENT_WINDOW: usize = 20;

/// Rolling performance bookkeeping for one strategy. History persists across
/// strategy switches so a demoted strategy can be re-promoted later.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceRecord {
    pub total_bets: u64,
    pub wins: u64,
    pub losses: u64,
    /// Sum of winning settlement amounts.
    pub profit_total: f64,
    /// Sum of losing settlement amounts (positive magnitude).
    pub loss_total: f64,
    pub cycles_completed: u64,
    pub cycles_won: u64,
    /// Last `RECENT_WINDOW` settlements as (won, signed amount).
    #[serde(skip)]
    recent: VecDeque<(bool, f64)>,
}

impl PerformanceRecord {
    /// Fold one settled bet into the record. `delta` is the signed balance
    /// change.
    pub fn record_bet(&mut self, won: bool, delta: f64) {
        self.total_bets += 1;
        if won {
            self.wins += 1;
            self.profit_total += delta;
        } else {
            self.losses += 1;
            self.loss_total += -delta;
        }
        self.recent.push_back((won, delta));
        if self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }
    }

    pub fn record_cycle(&mut self, won: bool) {
        self.cycles_completed += 1;
        if won {
            self.cycles_won += 1;
        }
    }

    pub fn recent_win_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let wins = self.recent.iter().filter(|(won, _)| *won).count();
        wins as f64 / self.recent.len() as f64
    }

    pub fn overall_win_rate(&self) -> f64 {
        if self.total_bets == 0 {
            return 0.0;
        }
        self.wins as f64 / self.total_bets as f64
    }

    pub fn cycle_win_rate(&self) -> f64 {
        if self.cycles_completed == 0 {
            return 0.0;
        }
        self.cycles_won as f64 / self.cycles_completed as f64
    }

    pub fn net(&self) -> f64 {
        self.profit_total - self.loss_total
    }

    pub fn profit_per_bet(&self) -> f64 {
        if self.total_bets == 0 {
            return 0.0;
        }
        self.net() / self.total_bets as f64
    }

    /// Composite quality score in [0, 1]: 40% recent form, 20% overall win
    /// rate, 30% profit per bet, 10% cycle completion.
    ///
    /// The profit component maps the raw average linearly from
    /// `[-profit_span, +profit_span]` onto [0, 1] and clamps beyond that, so
    /// break-even play scores 0.5 on that component. `profit_span` is the
    /// configured scale (defaulting to the base bet).
    pub fn score(&self, profit_span: f64) -> f64 {
        let span = if profit_span > 0.0 { profit_span } else { 1.0 };
        let normalized_profit = ((self.profit_per_bet() / span + 1.0) / 2.0).clamp(0.0, 1.0);
        0.4 * self.recent_win_rate()
            + 0.2 * self.overall_win_rate()
            + 0.3 * normalized_profit
            + 0.1 * self.cycle_win_rate()
    }
}

/// Strategy navigation tunables.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationConfig {
    pub enabled: bool,
    /// Re-score every this many settled strategy bets.
    pub evaluation_interval: u32,
    /// Both incumbent and challenger need this many settled bets to compare.
    pub min_bets_before_switch: u64,
    /// Challenger must beat the incumbent's score by this fraction.
    pub switch_threshold: f64,
    /// Linear scale for the profit component of the score.
    pub profit_span: f64,
}

/// An applied strategy switch.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub from: String,
    pub to: String,
    pub from_score: f64,
    pub to_score: f64,
}

/// Owns every strategy engine, routes outcomes, keeps score and picks which
/// engine drives betting.
///
/// All engines observe every outcome so their streak state stays warm; only
/// the active engine settles bets and emits decisions. Switches wait for the
/// active engine to be between cycles.
pub struct StrategyManager {
    engines: Vec<StrategyEngine>,
    records: Vec<PerformanceRecord>,
    active: usize,
    navigation: NavigationConfig,
    settled_since_eval: u32,
    pending_switch: Option<usize>,
}

impl StrategyManager {
    pub fn new(
        engines: Vec<StrategyEngine>,
        navigation: NavigationConfig,
    ) -> Result<Self, EngineError> {
        if engines.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one strategy is required".into(),
            ));
        }
        for (i, a) in engines.iter().enumerate() {
            if engines[i + 1..].iter().any(|b| b.kind() == a.kind()) {
                return Err(EngineError::InvalidConfig(format!(
                    "strategy {} configured twice",
                    a.name()
                )));
            }
        }
        let records = vec![PerformanceRecord::default(); engines.len()];
        Ok(StrategyManager {
            engines,
            records,
            active: 0,
            navigation,
            settled_since_eval: 0,
            pending_switch: None,
        })
    }

    pub fn engines(&self) -> &[StrategyEngine] {
        &self.engines
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn navigation(&self) -> &NavigationConfig {
        &self.navigation
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_name(&self) -> &'static str {
        self.engines[self.active].name()
    }

    /// Whether any engine has an open cycle. Keepalive bets are forbidden
    /// while this holds.
    pub fn cycle_active(&self) -> bool {
        self.engines.iter().any(|e| !e.is_idle())
    }

    /// Route one outcome: every engine's streaks update, only the active
    /// engine may settle or bet.
    pub fn on_outcome(&mut self, outcome: &Outcome) -> StrategyStep {
        for (i, engine) in self.engines.iter_mut().enumerate() {
            if i != self.active {
                engine.observe(outcome);
            }
        }
        self.engines[self.active].on_result(outcome)
    }

    /// Forward the executor's verdict to the engine that owns the bet.
    pub fn confirm_bet(&mut self, result: &BetResult) {
        self.engines[self.active].confirm_bet(result);
    }

    /// Book one settled strategy bet against the active record.
    pub fn record_settlement(&mut self, won: bool, delta: f64) {
        self.records[self.active].record_bet(won, delta);
        self.settled_since_eval += 1;
    }

    /// Book one finished cycle against the active record.
    pub fn record_cycle(&mut self, won: bool) {
        self.records[self.active].record_cycle(won);
    }

    pub fn force_resolve_active(&mut self, end: CycleEnd) -> Option<CycleReport> {
        self.engines[self.active].force_resolve(end)
    }

    /// Apply a deferred switch once the active engine is between cycles.
    pub fn take_switch(&mut self) -> Option<SwitchReport> {
        let target = self.pending_switch?;
        if !self.engines[self.active].is_idle() {
            return None;
        }
        self.pending_switch = None;
        if target == self.active {
            return None;
        }
        let span = self.navigation.profit_span;
        let report = SwitchReport {
            from: self.engines[self.active].name().to_string(),
            to: self.engines[target].name().to_string(),
            from_score: self.records[self.active].score(span),
            to_score: self.records[target].score(span),
        };
        info!(
            "Strategy switch: {} ({:.3}) -> {} ({:.3})",
            report.from, report.from_score, report.to, report.to_score
        );
        self.active = target;
        Some(report)
    }

    /// Re-score at the evaluation boundary and switch if a challenger clearly
    /// beats the incumbent. Returns the switch if it could be applied
    /// immediately; otherwise it stays pending until the cycle is idle.
    pub fn evaluate_if_due(&mut self) -> Option<SwitchReport> {
        if !self.navigation.enabled || self.engines.len() < 2 {
            return None;
        }
        if self.settled_since_eval < self.navigation.evaluation_interval {
            return None;
        }
        self.settled_since_eval = 0;
        self.evaluate();
        self.take_switch()
    }

    fn evaluate(&mut self) {
        let min_bets = self.navigation.min_bets_before_switch;
        if self.records[self.active].total_bets < min_bets {
            return;
        }
        let span = self.navigation.profit_span;
        let active_score = self.records[self.active].score(span);

        let mut best: Option<(usize, f64)> = None;
        for (i, record) in self.records.iter().enumerate() {
            if i == self.active || record.total_bets < min_bets {
                continue;
            }
            let score = record.score(span);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        // The latest evaluation always wins; a stale pending switch is
        // replaced or cancelled here.
        match best {
            Some((idx, score)) if score > active_score * (1.0 + self.navigation.switch_threshold) => {
                info!(
                    "Strategy navigation: {} ({:.3}) outscores {} ({:.3})",
                    self.engines[idx].name(),
                    score,
                    self.active_name(),
                    active_score
                );
                self.pending_switch = Some(idx);
            }
            _ => self.pending_switch = None,
        }
    }

    /// Operator restart: abandon open cycles and streak context. Performance
    /// records survive.
    pub fn reset_engines(&mut self) {
        for engine in &mut self.engines {
            engine.reset();
        }
        self.pending_switch = None;
    }
}
