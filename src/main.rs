use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

mod automation;
mod bot;
mod config;
mod dashboard;
mod db;
mod wheel;

use automation::{AutomationClient, BetExecutor, PaperTable};
use bot::engine::EngineEvent;
use bot::outcome::classify;
use bot::strategy::{BetDecision, BetResult};
use bot::EngineContext;
use config::Config;
use dashboard::AppState;
use db::models::BetRow;
use db::Database;
use wheel::{start_wheel_monitor, DetectorFeed, DetectorFeedConfig, SimulatedWheel, WheelProvider};

/// Journal row ID and confirmed amount of a bet still riding.
type OpenBet = Option<(i64, f64)>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.dry_run {
        info!(
            "🟡 DRY RUN mode – paper bets only (initial balance: ${:.2})",
            config.initial_balance
        );
    } else {
        info!("🔴 LIVE mode – real chips WILL be placed on the table");
    }

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Restore the session balance from the journal, or seed it on first run
    let starting_balance = match db.get_balance()? {
        Some(balance) if balance > 0.0 => {
            info!("Balance restored from journal: ${:.2}", balance);
            balance
        }
        _ => {
            db.record_balance(config.initial_balance)?;
            info!("Initial balance recorded: ${:.2}", config.initial_balance);
            config.initial_balance
        }
    };

    // Bet executor: paper table in dry-run, click automation live
    let executor: Arc<dyn BetExecutor> = match &config.automation_url {
        Some(url) if !config.dry_run => {
            Arc::new(AutomationClient::new(url, config.chip_value)?)
        }
        _ => Arc::new(PaperTable::new(config.chip_value)),
    };
    info!("Bet executor: {}", executor.name());

    // Wheel provider: detector feed when configured, simulated wheel otherwise
    let provider: Arc<dyn WheelProvider> = match &config.detector_ws_url {
        Some(url) => Arc::new(DetectorFeed::new(DetectorFeedConfig {
            name: "detector".into(),
            url: url.clone(),
            subscribe_message: None,
            ping_interval_secs: 25,
        })?),
        None => {
            if !config.dry_run {
                warn!("No detector configured – live bets will follow the simulated wheel");
            }
            Arc::new(SimulatedWheel::new(Duration::from_secs(
                config.spin_interval_secs,
            )))
        }
    };

    // The engine core, shared with the dashboard behind a single write lock
    let engine = Arc::new(RwLock::new(EngineContext::new(&config, starting_balance)?));
    info!(
        "Engine ready: strategies [{}], balance ${:.2}",
        config.strategies, starting_balance
    );

    // Start the dashboard HTTP server
    let dashboard_state = AppState {
        db: db.clone(),
        engine: Arc::clone(&engine),
        dry_run: config.dry_run,
    };
    let app = dashboard::router(dashboard_state);
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start the engine loop in its own task
    let bot_db = db.clone();
    let bot_engine = Arc::clone(&engine);
    let dry_run = config.dry_run;
    let poll_interval = Duration::from_secs(config.poll_interval_secs);

    tokio::spawn(async move {
        let mut rx = start_wheel_monitor(provider, poll_interval);
        let mut keepalive_sweep = tokio::time::interval(Duration::from_secs(5));

        // At most one strategy bet and one maintenance bet ride at a time
        let mut open_strategy_bet: OpenBet = None;
        let mut open_keepalive_bet: OpenBet = None;

        loop {
            tokio::select! {
                Some(spin) = rx.recv() => {
                    if let Err(e) = bot_db.record_spin(&spin) {
                        warn!("Failed to journal spin: {}", e);
                    }
                    let outcome = match classify(spin.number) {
                        Ok(o) => o,
                        Err(e) => {
                            warn!("Ignoring round {}: {}", spin.round_id, e);
                            continue;
                        }
                    };
                    // The pocket number is authoritative; a disagreeing
                    // detector colour claim is worth a look at the detector
                    if let Some(claimed) = spin.detected_color.as_deref() {
                        if claimed != outcome.color.as_str() {
                            warn!(
                                "Detector colour '{}' disagrees with pocket {} ({})",
                                claimed, spin.number, outcome.color.as_str()
                            );
                        }
                    }

                    let out = {
                        let mut ctx = bot_engine.write().await;
                        ctx.on_outcome(&outcome, Instant::now())
                    };
                    journal_events(
                        &bot_db,
                        &out.events,
                        &mut open_strategy_bet,
                        &mut open_keepalive_bet,
                        spin.number,
                    );
                    if let Some(decision) = out.decision {
                        place_and_confirm(
                            &bot_engine,
                            &bot_db,
                            executor.as_ref(),
                            decision,
                            dry_run,
                            &mut open_strategy_bet,
                            &mut open_keepalive_bet,
                        )
                        .await;
                    }
                }
                _ = keepalive_sweep.tick() => {
                    let out = {
                        let mut ctx = bot_engine.write().await;
                        ctx.keepalive_tick(Instant::now())
                    };
                    if let Some(decision) = out.decision {
                        place_and_confirm(
                            &bot_engine,
                            &bot_db,
                            executor.as_ref(),
                            decision,
                            dry_run,
                            &mut open_strategy_bet,
                            &mut open_keepalive_bet,
                        )
                        .await;
                    }
                }
            }
        }
    });

    // Run dashboard server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}

/// Journal engine events and settle any open bet rows they close out.
fn journal_events(
    db: &Database,
    events: &[EngineEvent],
    open_strategy_bet: &mut OpenBet,
    open_keepalive_bet: &mut OpenBet,
    settled_number: i64,
) {
    for event in events {
        let kind = match event {
            EngineEvent::BetSettled { .. } => "bet_resolved",
            EngineEvent::CycleEnded { .. } => "cycle_resolved",
            EngineEvent::StrategySwitched { .. } => "strategy_switched",
            EngineEvent::Stopped { .. } => "stop_triggered",
        };
        match serde_json::to_string(event) {
            Ok(payload) => {
                if let Err(e) = db.insert_event(kind, &payload) {
                    warn!("Failed to journal {} event: {}", kind, e);
                }
            }
            Err(e) => warn!("Failed to serialize {} event: {}", kind, e),
        }

        if let EngineEvent::BetSettled {
            won,
            keepalive,
            balance_after,
            ..
        } = event
        {
            let slot = if *keepalive {
                &mut *open_keepalive_bet
            } else {
                &mut *open_strategy_bet
            };
            if let Some((row_id, placed)) = slot.take() {
                let pnl = if *won { placed } else { -placed };
                if let Err(e) = db.resolve_bet(row_id, *won, settled_number, pnl) {
                    warn!("Failed to resolve bet {}: {}", row_id, e);
                }
            }
            if let Err(e) = db.record_balance(*balance_after) {
                warn!("Failed to journal balance: {}", e);
            }
        }
    }
}

/// Journal the decision, hand it to the executor and report the verdict back
/// to the engine.
async fn place_and_confirm(
    engine: &Arc<RwLock<EngineContext>>,
    db: &Database,
    executor: &dyn BetExecutor,
    decision: BetDecision,
    dry_run: bool,
    open_strategy_bet: &mut OpenBet,
    open_keepalive_bet: &mut OpenBet,
) {
    match serde_json::to_string(&decision) {
        Ok(payload) => {
            if let Err(e) = db.insert_event("bet_decided", &payload) {
                warn!("Failed to journal decision: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize decision: {}", e),
    }

    let result = match executor.place_bet(&decision).await {
        Ok(amount) => BetResult::placed(amount),
        Err(e) => {
            warn!("Placement via {} failed: {}", executor.name(), e);
            BetResult::failed(e.to_string())
        }
    };

    if result.success {
        let row = BetRow {
            id: None,
            strategy: decision.strategy.clone(),
            target: decision.target.as_str().to_string(),
            stake: decision.stake,
            placed_amount: result.placed_amount,
            gale_step: decision.gale_step as i64,
            keepalive: decision.keepalive,
            reason: decision.reason.clone(),
            status: "pending".to_string(),
            dry_run,
            placed_at: decision.decided_at,
            resolved_at: None,
            settled_number: None,
            pnl: None,
        };
        match db.insert_bet(&row) {
            Ok(row_id) => {
                let slot = if decision.keepalive {
                    open_keepalive_bet
                } else {
                    open_strategy_bet
                };
                *slot = Some((row_id, result.placed_amount));
            }
            Err(e) => warn!("Failed to journal bet: {}", e),
        }
    }

    engine.write().await.confirm_bet(&decision, &result);
}
