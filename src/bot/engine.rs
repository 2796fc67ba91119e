use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;

use super::keepalive::KeepaliveScheduler;
use super::manager::{NavigationConfig, PerformanceRecord, StrategyManager};
use super::outcome::Outcome;
use super::risk::{Balance, RiskGuard, RiskLimits, StopReason, Verdict};
use super::strategy::{
    BetDecision, BetResult, BetTarget, Cycle, CycleEnd, StrategyConfig, StrategyEngine,
};
use super::streak::StreakState;

/// Everything noteworthy the engine did while absorbing one input. The
/// runtime loop journals these and performs the actual I/O.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    BetSettled {
        strategy: String,
        target: BetTarget,
        amount: f64,
        gale_step: u32,
        won: bool,
        keepalive: bool,
        balance_before: f64,
        balance_after: f64,
    },
    CycleEnded {
        strategy: String,
        end: CycleEnd,
        final_step: u32,
        total_staked: f64,
        net: f64,
        balance_after: f64,
    },
    StrategySwitched {
        from: String,
        to: String,
        from_score: f64,
        to_score: f64,
    },
    Stopped {
        reason: StopReason,
        balance: f64,
        net: f64,
    },
}

/// Output of one engine step. At most one decision per step; the caller
/// places it and reports back via [`EngineContext::confirm_bet`].
#[derive(Debug, Default)]
pub struct StepOutput {
    pub events: Vec<EngineEvent>,
    pub decision: Option<BetDecision>,
}

/// A placed maintenance bet waiting for the next spin.
#[derive(Debug, Clone)]
struct PendingKeepalive {
    target: BetTarget,
    amount: f64,
}

/// Dashboard view of one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySnapshot {
    pub name: String,
    pub active: bool,
    pub score: f64,
    pub record: PerformanceRecord,
    pub cycle: Option<Cycle>,
    pub streaks: StreakState,
}

/// Dashboard view of the whole engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub balance: Balance,
    pub stopped: Option<String>,
    pub active_strategy: String,
    pub spins_seen: u64,
    pub keepalive_pending: bool,
    pub strategies: Vec<StrategySnapshot>,
}

/// Single-writer core of the bot: strategy engines, risk guard, keepalive and
/// balance behind one serialization point.
///
/// The context never performs I/O. Outcomes and timer ticks go in, events and
/// at most one bet decision come out; the runtime loop owns placement,
/// journaling and ordering. Both entry points must be called from the same
/// serialized task so a keepalive decision can never overlap a live cycle.
pub struct EngineContext {
    manager: StrategyManager,
    risk: RiskGuard,
    keepalive: KeepaliveScheduler,
    balance: Balance,
    pending_keepalive: Option<PendingKeepalive>,
    spins_seen: u64,
    shutdown: bool,
}

impl EngineContext {
    /// Build the full engine from CLI configuration. `starting_balance` is
    /// whatever the session journal says survived the last run.
    pub fn new(config: &Config, starting_balance: f64) -> Result<Self> {
        let kinds = config.strategy_kinds()?;
        let zero_policy = config.parsed_zero_policy()?;
        let custom_sequence = config.custom_sequence_values()?;

        let mut engines = Vec::with_capacity(kinds.len());
        for kind in kinds {
            engines.push(StrategyEngine::new(StrategyConfig {
                kind,
                base_bet: config.base_bet,
                max_gales: config.max_gales,
                multiplier: config.multiplier,
                custom_sequence: custom_sequence.clone(),
                streak_length: config.streak_length,
                zero_policy,
            })?);
        }
        let manager = StrategyManager::new(
            engines,
            NavigationConfig {
                enabled: config.navigation_enabled,
                evaluation_interval: config.evaluation_interval,
                min_bets_before_switch: config.min_bets_before_switch,
                switch_threshold: config.switch_threshold,
                profit_span: config.profit_span(),
            },
        )?;
        let risk = RiskGuard::new(RiskLimits {
            stop_loss: config.stop_loss,
            stop_loss_count: config.stop_loss_count,
            stop_win: config.stop_win,
            stop_win_count: config.stop_win_count,
            guarantee_fund: config.guarantee_fund_percentage,
        })?;
        let keepalive = KeepaliveScheduler::new(
            config.keepalive_stake,
            Duration::from_secs(config.keepalive_interval_secs),
        );
        Ok(Self::from_parts(manager, risk, keepalive, starting_balance))
    }

    pub fn from_parts(
        manager: StrategyManager,
        risk: RiskGuard,
        keepalive: KeepaliveScheduler,
        starting_balance: f64,
    ) -> Self {
        EngineContext {
            manager,
            risk,
            keepalive,
            balance: Balance::new(starting_balance),
            pending_keepalive: None,
            spins_seen: 0,
            shutdown: false,
        }
    }

    pub fn halted(&self) -> bool {
        self.shutdown || self.risk.stopped().is_some()
    }

    /// Absorb one classified outcome.
    pub fn on_outcome(&mut self, outcome: &Outcome, now: Instant) -> StepOutput {
        let mut out = StepOutput::default();
        if self.halted() {
            return out;
        }
        self.spins_seen += 1;
        info!(
            "Spin {}: {} ({}/{})",
            self.spins_seen,
            outcome.number,
            outcome.color.as_str(),
            outcome.parity.as_str()
        );

        // Deferred strategy switches land between cycles, before the new
        // engine sees this outcome.
        if let Some(switch) = self.manager.take_switch() {
            out.events.push(EngineEvent::StrategySwitched {
                from: switch.from,
                to: switch.to,
                from_score: switch.from_score,
                to_score: switch.to_score,
            });
        }

        // A maintenance bet on the table settles like any even-money bet;
        // zero loses it regardless of zero policy.
        if let Some(pending) = self.pending_keepalive.take() {
            let won = pending.target.wins_on(outcome);
            let before = self.balance.current;
            self.balance
                .apply(if won { pending.amount } else { -pending.amount });
            out.events.push(EngineEvent::BetSettled {
                strategy: "keepalive".into(),
                target: pending.target,
                amount: pending.amount,
                gale_step: 0,
                won,
                keepalive: true,
                balance_before: before,
                balance_after: self.balance.current,
            });
            if let Some(reason) = self.risk.after_settlement(won, &self.balance) {
                self.push_stop(&mut out, reason);
                return out;
            }
        }

        let step = self.manager.on_outcome(outcome);
        let settled_won = step.settled.as_ref().map(|s| s.won);

        if let Some(settled) = step.settled {
            let before = self.balance.current;
            let delta = if settled.won {
                settled.amount
            } else {
                -settled.amount
            };
            self.balance.apply(delta);
            self.keepalive.note_activity(now);
            info!(
                "{} {} {:.2} on {} at step {} (balance {:.2})",
                self.manager.active_name(),
                if settled.won { "won" } else { "lost" },
                settled.amount,
                settled.target.as_str(),
                settled.gale_step,
                self.balance.current
            );
            out.events.push(EngineEvent::BetSettled {
                strategy: self.manager.active_name().to_string(),
                target: settled.target,
                amount: settled.amount,
                gale_step: settled.gale_step,
                won: settled.won,
                keepalive: false,
                balance_before: before,
                balance_after: self.balance.current,
            });
            self.manager.record_settlement(settled.won, delta);
        }

        if let Some(report) = &step.cycle {
            self.manager.record_cycle(report.end.is_win());
            self.keepalive.note_activity(now);
            info!(
                "Cycle {} for {}: net {:+.2} over {} step(s)",
                report.end.as_str(),
                self.manager.active_name(),
                report.net,
                report.final_step + 1
            );
            out.events.push(EngineEvent::CycleEnded {
                strategy: self.manager.active_name().to_string(),
                end: report.end,
                final_step: report.final_step,
                total_staked: report.total_staked,
                net: report.net,
                balance_after: self.balance.current,
            });
        }

        // Stop limits are checked on the settling bet. A stop mid-gale
        // abandons the open cycle as a forced loss and suppresses whatever
        // decision this outcome produced.
        if let Some(won) = settled_won {
            if let Some(reason) = self.risk.after_settlement(won, &self.balance) {
                if let Some(forced) = self.manager.force_resolve_active(CycleEnd::Forced) {
                    self.manager.record_cycle(false);
                    out.events.push(EngineEvent::CycleEnded {
                        strategy: self.manager.active_name().to_string(),
                        end: forced.end,
                        final_step: forced.final_step,
                        total_staked: forced.total_staked,
                        net: forced.net,
                        balance_after: self.balance.current,
                    });
                }
                self.push_stop(&mut out, reason);
                return out;
            }
        }

        if let Some(decision) = step.decision {
            match self.risk.authorize(&decision, &self.balance) {
                Verdict::Allow => {
                    self.keepalive.note_activity(now);
                    info!(
                        "Decision: {} {:.2} on {} (step {}, {})",
                        decision.strategy,
                        decision.stake,
                        decision.target.as_str(),
                        decision.gale_step,
                        decision.reason
                    );
                    out.decision = Some(decision);
                }
                Verdict::Deny(why) => {
                    // Skipping the stake silently would desynchronize the gale
                    // progression from real exposure, so the cycle dies here.
                    warn!(
                        "Denied {} stake {:.2}: {}",
                        decision.strategy, decision.stake, why
                    );
                    if let Some(forced) = self.manager.force_resolve_active(CycleEnd::Forced) {
                        self.manager.record_cycle(false);
                        out.events.push(EngineEvent::CycleEnded {
                            strategy: self.manager.active_name().to_string(),
                            end: forced.end,
                            final_step: forced.final_step,
                            total_staked: forced.total_staked,
                            net: forced.net,
                            balance_after: self.balance.current,
                        });
                    }
                }
                Verdict::Stopped(_) => {}
            }
        }

        if let Some(switch) = self.manager.evaluate_if_due() {
            out.events.push(EngineEvent::StrategySwitched {
                from: switch.from,
                to: switch.to,
                from_score: switch.from_score,
                to_score: switch.to_score,
            });
        }

        out
    }

    /// Timer entry point. Runs on the same serialized loop as `on_outcome`,
    /// so a keepalive decision can never race a cycle entry.
    pub fn keepalive_tick(&mut self, now: Instant) -> StepOutput {
        let mut out = StepOutput::default();
        if self.halted() {
            return out;
        }
        let busy = self.manager.cycle_active() || self.pending_keepalive.is_some();
        let mut rng = rand::thread_rng();
        let Some(decision) = self.keepalive.poll(now, busy, &mut rng) else {
            return out;
        };
        match self.risk.authorize(&decision, &self.balance) {
            Verdict::Allow => {
                info!(
                    "Keepalive: {:.2} on {} ({})",
                    decision.stake,
                    decision.target.as_str(),
                    decision.reason
                );
                out.decision = Some(decision);
            }
            // No cycle to unwind for a refused maintenance bet
            Verdict::Deny(why) => warn!("Keepalive bet denied: {}", why),
            Verdict::Stopped(_) => {}
        }
        out
    }

    /// Report the executor's verdict for a decision this context produced.
    pub fn confirm_bet(&mut self, decision: &BetDecision, result: &BetResult) {
        if decision.keepalive {
            if result.success && result.placed_amount > 0.0 {
                self.pending_keepalive = Some(PendingKeepalive {
                    target: decision.target,
                    amount: result.placed_amount,
                });
            } else {
                warn!(
                    "Keepalive placement failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            return;
        }
        if !result.success {
            warn!(
                "Placement failed for {} {:.2} on {}: {}",
                decision.strategy,
                decision.stake,
                decision.target.as_str(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        self.manager.confirm_bet(result);
    }

    /// Refuse all further inputs until `restart`.
    pub fn stop(&mut self) {
        self.shutdown = true;
        info!("Engine stopped by operator");
    }

    /// Operator restart after a stop: risk latch cleared, open cycles and
    /// streak context abandoned, balance and records carried over.
    pub fn restart(&mut self) {
        self.shutdown = false;
        self.risk.reset();
        self.manager.reset_engines();
        self.pending_keepalive = None;
        info!("Engine restarted (balance {:.2})", self.balance.current);
    }

    /// Read-only snapshot for the dashboard.
    pub fn snapshot(&self) -> EngineSnapshot {
        let span = self.manager.navigation().profit_span;
        let active = self.manager.active_index();
        let strategies = self
            .manager
            .engines()
            .iter()
            .zip(self.manager.records())
            .enumerate()
            .map(|(i, (engine, record))| StrategySnapshot {
                name: engine.name().to_string(),
                active: i == active,
                score: record.score(span),
                record: record.clone(),
                cycle: engine.cycle().cloned(),
                streaks: engine.streaks().clone(),
            })
            .collect();
        let stopped = if self.shutdown {
            Some("operator".to_string())
        } else {
            self.risk.stopped().map(|r| r.as_str().to_string())
        };
        EngineSnapshot {
            balance: self.balance.clone(),
            stopped,
            active_strategy: self.manager.active_name().to_string(),
            spins_seen: self.spins_seen,
            keepalive_pending: self.pending_keepalive.is_some(),
            strategies,
        }
    }

    fn push_stop(&mut self, out: &mut StepOutput, reason: StopReason) {
        warn!(
            "Session stop: {} (balance {:.2}, net {:+.2})",
            reason.as_str(),
            self.balance.current,
            self.balance.net()
        );
        out.events.push(EngineEvent::Stopped {
            reason,
            balance: self.balance.current,
            net: self.balance.net(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::outcome::{classify, Color, Parity};
    use crate::bot::strategy::StrategyKind;
    use crate::bot::streak::ZeroPolicy;
    use approx::assert_relative_eq;

    fn spin(n: i64) -> Outcome {
        classify(n).unwrap()
    }

    fn make_strategy(kind: StrategyKind, base_bet: f64) -> StrategyEngine {
        StrategyEngine::new(StrategyConfig {
            kind,
            base_bet,
            max_gales: 2,
            multiplier: 2.0,
            custom_sequence: vec![1.0, 1.0, 1.0, 1.0],
            streak_length: 3,
            zero_policy: ZeroPolicy::CountAsLoss,
        })
        .unwrap()
    }

    fn make_context(limits: RiskLimits, keepalive_stake: f64, base_bet: f64) -> EngineContext {
        let manager = StrategyManager::new(
            vec![make_strategy(StrategyKind::Martingale, base_bet)],
            NavigationConfig {
                enabled: false,
                evaluation_interval: 10,
                min_bets_before_switch: 5,
                switch_threshold: 0.15,
                profit_span: base_bet,
            },
        )
        .unwrap();
        let risk = RiskGuard::new(limits).unwrap();
        let keepalive = KeepaliveScheduler::new(keepalive_stake, Duration::from_secs(300));
        EngineContext::from_parts(manager, risk, keepalive, 1000.0)
    }

    fn loose_limits() -> RiskLimits {
        RiskLimits {
            stop_loss: 0.0,
            stop_loss_count: 0,
            stop_win: 0.0,
            stop_win_count: 0,
            guarantee_fund: 0.0,
        }
    }

    /// Drive one outcome and confirm any decision as fully placed.
    fn drive(ctx: &mut EngineContext, n: i64, now: Instant) -> StepOutput {
        let out = ctx.on_outcome(&spin(n), now);
        if let Some(decision) = &out.decision {
            ctx.confirm_bet(decision, &BetResult::placed(decision.stake));
        }
        out
    }

    #[test]
    fn test_full_cycle_with_recovery_win() {
        let mut ctx = make_context(loose_limits(), 0.0, 10.0);
        let now = Instant::now();

        // Three reds build the streak; the third emits the entry on black
        drive(&mut ctx, 5, now);
        drive(&mut ctx, 12, now);
        let out = drive(&mut ctx, 19, now);
        assert_eq!(
            out.decision.as_ref().map(|d| d.target),
            Some(BetTarget::Color(Color::Black))
        );

        // Red again: entry loses, gale 1 decision for 20
        let out = drive(&mut ctx, 21, now);
        assert_relative_eq!(ctx.balance.current, 990.0, epsilon = 1e-9);
        assert_eq!(out.decision.as_ref().unwrap().gale_step, 1);

        // Black settles the recovery win: cycle net +10, no entry this spin
        let out = drive(&mut ctx, 6, now);
        assert_relative_eq!(ctx.balance.current, 1010.0, epsilon = 1e-9);
        assert!(out.decision.is_none());
        let ended = out.events.iter().any(|e| {
            matches!(e, EngineEvent::CycleEnded { end: CycleEnd::Won, net, .. }
                if (*net - 10.0).abs() < 1e-9)
        });
        assert!(ended, "expected winning cycle event, got {:?}", out.events);

        // Streaks kept updating through the cycle: 6 started an even run,
        // the next odd outcome flips it
        let out = ctx.on_outcome(&spin(7), Instant::now());
        assert!(out.decision.is_none());
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.strategies[0].streaks.parity, Some(Parity::Odd));
        assert_eq!(snapshot.strategies[0].streaks.parity_len, 1);
    }

    #[test]
    fn test_even_run_entry_win_and_fresh_streak() {
        // Five evens build the run, the sixth spin (odd) wins the counter bet,
        // the seventh (even) starts a fresh run of one.
        let manager = StrategyManager::new(
            vec![StrategyEngine::new(StrategyConfig {
                kind: StrategyKind::EvenOdd,
                base_bet: 10.0,
                max_gales: 3,
                multiplier: 2.0,
                custom_sequence: vec![1.0],
                streak_length: 5,
                zero_policy: ZeroPolicy::CountAsLoss,
            })
            .unwrap()],
            NavigationConfig {
                enabled: false,
                evaluation_interval: 10,
                min_bets_before_switch: 5,
                switch_threshold: 0.15,
                profit_span: 10.0,
            },
        )
        .unwrap();
        let mut ctx = EngineContext::from_parts(
            manager,
            RiskGuard::new(loose_limits()).unwrap(),
            KeepaliveScheduler::new(0.0, Duration::from_secs(300)),
            1000.0,
        );
        let now = Instant::now();

        for n in [2, 12, 4, 14] {
            assert!(drive(&mut ctx, n, now).decision.is_none());
        }
        // Fifth even: entry on odd for the base stake
        let out = drive(&mut ctx, 6, now);
        let entry = out.decision.expect("entry after the fifth even");
        assert_eq!(entry.target, BetTarget::Parity(Parity::Odd));
        assert_relative_eq!(entry.stake, 10.0, epsilon = 1e-9);

        // Odd wins the cycle at step 0
        let out = drive(&mut ctx, 7, now);
        assert_relative_eq!(ctx.balance.current, 1010.0, epsilon = 1e-9);
        assert!(out.events.iter().any(|e| matches!(
            e,
            EngineEvent::CycleEnded {
                end: CycleEnd::Won,
                final_step: 0,
                ..
            }
        )));

        // The next even is a fresh run of one, nowhere near re-entry
        let out = drive(&mut ctx, 8, now);
        assert!(out.decision.is_none());
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.strategies[0].streaks.parity, Some(Parity::Even));
        assert_eq!(snapshot.strategies[0].streaks.parity_len, 1);
    }

    #[test]
    fn test_stop_loss_triggers_on_settling_bet() {
        let limits = RiskLimits {
            stop_loss: 500.0,
            ..loose_limits()
        };
        // Custom flat ladder of 250 per step
        let manager = StrategyManager::new(
            vec![make_strategy(StrategyKind::Custom, 250.0)],
            NavigationConfig {
                enabled: false,
                evaluation_interval: 10,
                min_bets_before_switch: 5,
                switch_threshold: 0.15,
                profit_span: 250.0,
            },
        )
        .unwrap();
        let mut ctx = EngineContext::from_parts(
            manager,
            RiskGuard::new(limits).unwrap(),
            KeepaliveScheduler::new(0.0, Duration::from_secs(300)),
            1000.0,
        );
        let now = Instant::now();

        drive(&mut ctx, 5, now);
        drive(&mut ctx, 12, now);
        drive(&mut ctx, 19, now);
        // First loss: 750 left, no stop yet
        let out = drive(&mut ctx, 21, now);
        assert!(!out.events.iter().any(|e| matches!(e, EngineEvent::Stopped { .. })));
        // Second loss lands exactly on the limit: stop fires on this
        // settlement, the gale decision is suppressed, the cycle is forced
        let out = ctx.on_outcome(&spin(19), now);
        assert_relative_eq!(ctx.balance.current, 500.0, epsilon = 1e-9);
        assert!(out.decision.is_none());
        assert!(out.events.iter().any(|e| matches!(
            e,
            EngineEvent::Stopped {
                reason: StopReason::StopLossMoney,
                ..
            }
        )));
        assert!(out.events.iter().any(|e| matches!(
            e,
            EngineEvent::CycleEnded {
                end: CycleEnd::Forced,
                ..
            }
        )));
        assert!(ctx.halted());

        // Halted context ignores further outcomes entirely
        let out = ctx.on_outcome(&spin(10), now);
        assert!(out.events.is_empty());
        assert!(out.decision.is_none());
    }

    #[test]
    fn test_guarantee_fund_denial_forces_cycle_loss() {
        let limits = RiskLimits {
            guarantee_fund: 0.9,
            ..loose_limits()
        };
        let mut ctx = make_context(limits, 0.0, 50.0);
        let now = Instant::now();

        drive(&mut ctx, 5, now);
        drive(&mut ctx, 12, now);
        // Entry for 50 passes: 1000 - 50 = 950 >= 900
        let out = drive(&mut ctx, 19, now);
        assert!(out.decision.is_some());
        // The lost entry leaves 950; the 100 gale stake would leave 850,
        // under the 855 reserve, so the cycle force-resolves instead
        let out = ctx.on_outcome(&spin(21), now);
        assert!(out.decision.is_none());
        assert!(out.events.iter().any(|e| matches!(
            e,
            EngineEvent::CycleEnded {
                end: CycleEnd::Forced,
                ..
            }
        )));
        // Denial is not a stop: the engine keeps running
        assert!(!ctx.halted());
        assert_relative_eq!(ctx.balance.current, 950.0, epsilon = 1e-9);
    }

    #[test]
    fn test_keepalive_lifecycle() {
        let mut ctx = make_context(loose_limits(), 1.0, 10.0);
        let start = Instant::now();

        // Idle long enough: the tick emits a maintenance bet
        let out = ctx.keepalive_tick(start + Duration::from_secs(600));
        let decision = out.decision.expect("keepalive decision");
        assert!(decision.keepalive);
        ctx.confirm_bet(&decision, &BetResult::placed(1.0));
        assert!(ctx.snapshot().keepalive_pending);

        // While pending, another tick stays quiet
        let out = ctx.keepalive_tick(start + Duration::from_secs(1200));
        assert!(out.decision.is_none());

        // The next spin settles it against the bet's colour
        let outcome = spin(14); // red
        let won = matches!(decision.target, BetTarget::Color(Color::Red));
        let out = ctx.on_outcome(&outcome, start + Duration::from_secs(1201));
        let expected = if won { 1001.0 } else { 999.0 };
        assert_relative_eq!(ctx.balance.current, expected, epsilon = 1e-9);
        assert!(out.events.iter().any(|e| matches!(
            e,
            EngineEvent::BetSettled {
                keepalive: true,
                ..
            }
        )));
        // Maintenance bets never touch strategy records
        assert_eq!(ctx.snapshot().strategies[0].record.total_bets, 0);
    }

    #[test]
    fn test_keepalive_suppressed_during_cycle() {
        let mut ctx = make_context(loose_limits(), 1.0, 10.0);
        let start = Instant::now();
        drive(&mut ctx, 5, start);
        drive(&mut ctx, 12, start);
        let out = drive(&mut ctx, 19, start);
        assert!(out.decision.is_some());

        // Cycle active: even a very late tick is mutual-exclusion suppressed
        let out = ctx.keepalive_tick(start + Duration::from_secs(3600));
        assert!(out.decision.is_none());
    }

    #[test]
    fn test_failed_placement_reoffer_roundtrip() {
        let mut ctx = make_context(loose_limits(), 0.0, 10.0);
        let now = Instant::now();
        drive(&mut ctx, 5, now);
        drive(&mut ctx, 12, now);
        let out = ctx.on_outcome(&spin(19), now);
        let entry = out.decision.unwrap();
        ctx.confirm_bet(&entry, &BetResult::failed("automation offline"));

        // Nothing settles on the next spin; the same step is offered again
        let out = ctx.on_outcome(&spin(33), now);
        assert!(out.events.iter().all(|e| !matches!(e, EngineEvent::BetSettled { .. })));
        let reoffer = out.decision.expect("re-offer");
        assert_eq!(reoffer.gale_step, 0);
        assert_relative_eq!(reoffer.stake, 10.0, epsilon = 1e-9);
        assert_relative_eq!(ctx.balance.current, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_outcomes_never_reach_context() {
        // classify is the only door in; anything out of range fails there
        assert!(classify(37).is_err());
        assert!(classify(-3).is_err());
    }
}
