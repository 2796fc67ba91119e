use clap::Parser;

use crate::bot::strategy::StrategyKind;
use crate::bot::streak::ZeroPolicy;

/// Roulette strategy bot with gale progression and risk limits
#[derive(Parser, Debug, Clone)]
#[command(name = "roulette-bot", version, about)]
pub struct Config {
    /// Run in dry-run mode (paper bets against a simulated wheel)
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Starting session bankroll
    #[arg(long, env = "INITIAL_BALANCE", default_value = "1000.0")]
    pub initial_balance: f64,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "roulette.db")]
    pub database_path: String,

    /// Comma-separated strategies to load
    /// (martingale, fibonacci, custom, even_odd, red_black)
    #[arg(long, env = "STRATEGIES", default_value = "martingale")]
    pub strategies: String,

    /// Stake at gale step 0
    #[arg(long, env = "BASE_BET", default_value = "2.0")]
    pub base_bet: f64,

    /// Recovery steps allowed after the entry bet (0 = one bet per cycle)
    #[arg(long, env = "MAX_GALES", default_value = "2")]
    pub max_gales: u32,

    /// Stake multiplier per gale step (martingale, even_odd, red_black)
    #[arg(long, env = "MULTIPLIER", default_value = "2.0")]
    pub multiplier: f64,

    /// Custom stake ladder in base-bet multiples, comma separated
    #[arg(long, env = "CUSTOM_SEQUENCE", default_value = "1,2,4")]
    pub custom_sequence: String,

    /// Consecutive same-type outcomes required before entering a cycle
    #[arg(long, env = "STREAK_LENGTH", default_value = "4")]
    pub streak_length: u32,

    /// Zero handling: count_as_loss, neutral or reset
    #[arg(long, env = "ZERO_POLICY", default_value = "count_as_loss")]
    pub zero_policy: String,

    /// Stop once the session is down this much (0 disables)
    #[arg(long, env = "STOP_LOSS", default_value = "200.0")]
    pub stop_loss: f64,

    /// Stop after this many consecutive losing bets (0 disables)
    #[arg(long, env = "STOP_LOSS_COUNT", default_value = "0")]
    pub stop_loss_count: u32,

    /// Stop once the session is up this much (0 disables)
    #[arg(long, env = "STOP_WIN", default_value = "100.0")]
    pub stop_win: f64,

    /// Stop after this many consecutive winning bets (0 disables)
    #[arg(long, env = "STOP_WIN_COUNT", default_value = "0")]
    pub stop_win_count: u32,

    /// Fraction of the current balance no single stake may dip into
    #[arg(long, env = "GUARANTEE_FUND_PERCENTAGE", default_value = "0.3")]
    pub guarantee_fund_percentage: f64,

    /// Maintenance bet stake to keep the table session alive (0 disables)
    #[arg(long, env = "KEEPALIVE_STAKE", default_value = "0.0")]
    pub keepalive_stake: f64,

    /// Idle seconds before a maintenance bet fires
    #[arg(long, env = "KEEPALIVE_INTERVAL_SECS", default_value = "300")]
    pub keepalive_interval_secs: u64,

    /// Score strategies periodically and switch to the best performer
    #[arg(long, env = "NAVIGATION_ENABLED", default_value = "false")]
    pub navigation_enabled: bool,

    /// Re-score strategies every this many settled bets
    #[arg(long, env = "EVALUATION_INTERVAL", default_value = "10")]
    pub evaluation_interval: u32,

    /// Settled bets a strategy needs before it takes part in switching
    #[arg(long, env = "MIN_BETS_BEFORE_SWITCH", default_value = "5")]
    pub min_bets_before_switch: u64,

    /// Fractional score lead a challenger needs to take over
    #[arg(long, env = "SWITCH_THRESHOLD", default_value = "0.15")]
    pub switch_threshold: f64,

    /// Profit-per-bet span mapped onto the score's profit component
    /// (0 = use base_bet)
    #[arg(long, env = "SCORE_PROFIT_SPAN", default_value = "0")]
    pub score_profit_span: f64,

    /// Detector WebSocket URL streaming live wheel outcomes
    #[arg(long, env = "DETECTOR_WS_URL")]
    pub detector_ws_url: Option<String>,

    /// Browser-automation service base URL (required for live betting)
    #[arg(long, env = "AUTOMATION_URL")]
    pub automation_url: Option<String>,

    /// Platform chip denomination stakes are rounded down to
    #[arg(long, env = "CHIP_VALUE", default_value = "0.1")]
    pub chip_value: f64,

    /// Simulated wheel spin interval in seconds (dry-run without a detector)
    #[arg(long, env = "SPIN_INTERVAL_SECS", default_value = "15")]
    pub spin_interval_secs: u64,

    /// Wheel provider polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "1")]
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.dry_run && self.automation_url.is_none() {
            anyhow::bail!(
                "AUTOMATION_URL is required in live betting mode. Use --dry-run for paper betting."
            );
        }
        if self.initial_balance <= 0.0 {
            anyhow::bail!("initial_balance must be positive");
        }
        if self.chip_value <= 0.0 {
            anyhow::bail!("chip_value must be positive");
        }
        if !(0.0..1.0).contains(&self.guarantee_fund_percentage) {
            anyhow::bail!("guarantee_fund_percentage must be between 0.0 and 1.0 (exclusive)");
        }
        if self.switch_threshold < 0.0 {
            anyhow::bail!("switch_threshold must not be negative");
        }
        if self.spin_interval_secs == 0 || self.poll_interval_secs == 0 {
            anyhow::bail!("spin and poll intervals must be at least 1 second");
        }
        let kinds = self.strategy_kinds()?;
        if self.navigation_enabled && kinds.len() < 2 {
            anyhow::bail!("strategy navigation needs at least two strategies");
        }
        self.parsed_zero_policy()?;
        if kinds.contains(&StrategyKind::Custom) {
            self.custom_sequence_values()?;
        }
        // Per-strategy stake parameters are re-validated by the engines
        Ok(())
    }

    /// Parsed strategy list, configured order preserved.
    pub fn strategy_kinds(&self) -> anyhow::Result<Vec<StrategyKind>> {
        let kinds: Vec<StrategyKind> = self
            .strategies
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                StrategyKind::parse(s)
                    .ok_or_else(|| anyhow::anyhow!("unknown strategy '{}' in --strategies", s))
            })
            .collect::<anyhow::Result<_>>()?;
        if kinds.is_empty() {
            anyhow::bail!("--strategies must name at least one strategy");
        }
        Ok(kinds)
    }

    pub fn parsed_zero_policy(&self) -> anyhow::Result<ZeroPolicy> {
        ZeroPolicy::parse(&self.zero_policy).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown zero policy '{}' (expected count_as_loss, neutral or reset)",
                self.zero_policy
            )
        })
    }

    /// Custom stake ladder parsed from the comma-separated flag.
    pub fn custom_sequence_values(&self) -> anyhow::Result<Vec<f64>> {
        self.custom_sequence
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>().map_err(|_| {
                    anyhow::anyhow!("invalid custom sequence entry '{}' (expected a number)", s)
                })
            })
            .collect()
    }

    /// Profit span for strategy scoring; falls back to the base bet.
    pub fn profit_span(&self) -> f64 {
        if self.score_profit_span > 0.0 {
            self.score_profit_span
        } else {
            self.base_bet
        }
    }
}
