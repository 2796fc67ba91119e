use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub mod models;
use models::*;

/// Thread-safe SQLite session journal (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Balance ──────────────────────────────────────────────────────────────

    /// Latest journaled balance, if any session has run before
    pub fn get_balance(&self) -> Result<Option<f64>> {
        let conn = self.conn.lock().unwrap();
        let balance = conn
            .query_row(
                "SELECT balance FROM balance_history ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();
        Ok(balance)
    }

    /// Record a balance snapshot
    pub fn record_balance(&self, balance: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO balance_history (balance, recorded_at) VALUES (?1, ?2)",
            params![balance, Utc::now()],
        )?;
        Ok(())
    }

    /// Balance history for charting
    pub fn get_balance_history(&self, limit: i64) -> Result<Vec<BalanceSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT balance, recorded_at FROM balance_history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(BalanceSnapshot {
                    balance: row.get(0)?,
                    recorded_at: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Spins ────────────────────────────────────────────────────────────────

    /// Journal one wheel spin
    pub fn record_spin(&self, spin: &SpinOutcome) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO spins (
                round_id, number, detected_color, confidence, method,
                source, observed_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                spin.round_id,
                spin.number,
                spin.detected_color,
                spin.confidence,
                spin.method,
                spin.source,
                spin.observed_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent spins, newest first
    pub fn list_recent_spins(&self, limit: i64) -> Result<Vec<SpinOutcome>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, round_id, number, detected_color, confidence, method,
                    source, observed_at
             FROM spins ORDER BY id DESC LIMIT ?1",
        )?;
        let spins = stmt
            .query_map(params![limit], map_spin)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(spins)
    }

    // ── Bets ─────────────────────────────────────────────────────────────────

    /// Journal a placed bet; returns the row ID used later to resolve it
    pub fn insert_bet(&self, bet: &BetRow) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bets (
                strategy, target, stake, placed_amount, gale_step, keepalive,
                reason, status, dry_run, placed_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                bet.strategy,
                bet.target,
                bet.stake,
                bet.placed_amount,
                bet.gale_step,
                bet.keepalive,
                bet.reason,
                bet.status,
                bet.dry_run,
                bet.placed_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Settle a journaled bet against the spin that resolved it
    pub fn resolve_bet(&self, id: i64, won: bool, settled_number: i64, pnl: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE bets SET status=?1, settled_number=?2, pnl=?3, resolved_at=?4 WHERE id=?5",
            params![
                if won { "won" } else { "lost" },
                settled_number,
                pnl,
                Utc::now(),
                id
            ],
        )?;
        Ok(())
    }

    /// Most recent bets, newest first
    pub fn list_recent_bets(&self, limit: i64) -> Result<Vec<BetRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, strategy, target, stake, placed_amount, gale_step,
                    keepalive, reason, status, dry_run, placed_at, resolved_at,
                    settled_number, pnl
             FROM bets ORDER BY placed_at DESC LIMIT ?1",
        )?;
        let bets = stmt
            .query_map(params![limit], map_bet)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bets)
    }

    // ── Engine events ────────────────────────────────────────────────────────

    /// Journal an engine event as a JSON payload
    pub fn insert_event(&self, kind: &str, payload: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO engine_events (kind, payload, recorded_at) VALUES (?1,?2,?3)",
            params![kind, payload, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent engine events, newest first
    pub fn list_recent_events(&self, limit: i64) -> Result<Vec<EventRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, payload, recorded_at
             FROM engine_events ORDER BY id DESC LIMIT ?1",
        )?;
        let events = stmt
            .query_map(params![limit], |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    payload: row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    // ── Stats ────────────────────────────────────────────────────────────────

    /// Aggregate session stats
    pub fn get_stats(&self) -> Result<Stats> {
        let conn = self.conn.lock().unwrap();
        let total_bets: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bets WHERE status != 'pending'",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        let won_bets: i64 = conn
            .query_row("SELECT COUNT(*) FROM bets WHERE status = 'won'", [], |r| {
                r.get(0)
            })
            .unwrap_or(0);
        let total_pnl: f64 = conn
            .query_row("SELECT COALESCE(SUM(pnl),0) FROM bets", [], |r| r.get(0))
            .unwrap_or(0.0);
        let pending_bets: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bets WHERE status = 'pending'",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        let total_spins: i64 = conn
            .query_row("SELECT COUNT(*) FROM spins", [], |r| r.get(0))
            .unwrap_or(0);
        let balance: f64 = conn
            .query_row(
                "SELECT balance FROM balance_history ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0.0);
        Ok(Stats {
            total_bets,
            won_bets,
            total_pnl,
            pending_bets,
            total_spins,
            current_balance: balance,
        })
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_spin(row: &rusqlite::Row) -> rusqlite::Result<SpinOutcome> {
    Ok(SpinOutcome {
        id: row.get(0)?,
        round_id: row.get(1)?,
        number: row.get(2)?,
        detected_color: row.get(3)?,
        confidence: row.get(4)?,
        method: row.get(5)?,
        source: row.get(6)?,
        observed_at: row.get(7)?,
    })
}

fn map_bet(row: &rusqlite::Row) -> rusqlite::Result<BetRow> {
    Ok(BetRow {
        id: row.get(0)?,
        strategy: row.get(1)?,
        target: row.get(2)?,
        stake: row.get(3)?,
        placed_amount: row.get(4)?,
        gale_step: row.get(5)?,
        keepalive: row.get(6)?,
        reason: row.get(7)?,
        status: row.get(8)?,
        dry_run: row.get(9)?,
        placed_at: row.get(10)?,
        resolved_at: row.get(11)?,
        settled_number: row.get(12)?,
        pnl: row.get(13)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS balance_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    balance     REAL    NOT NULL,
    recorded_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS spins (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    round_id       TEXT    NOT NULL,
    number         INTEGER NOT NULL,
    detected_color TEXT,
    confidence     REAL,
    method         TEXT,
    source         TEXT    NOT NULL,
    observed_at    TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS bets (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy       TEXT    NOT NULL,
    target         TEXT    NOT NULL,
    stake          REAL    NOT NULL,
    placed_amount  REAL    NOT NULL,
    gale_step      INTEGER NOT NULL DEFAULT 0,
    keepalive      INTEGER NOT NULL DEFAULT 0,
    reason         TEXT    NOT NULL DEFAULT '',
    status         TEXT    NOT NULL DEFAULT 'pending',
    dry_run        INTEGER NOT NULL DEFAULT 1,
    placed_at      TEXT    NOT NULL,
    resolved_at    TEXT,
    settled_number INTEGER,
    pnl            REAL
);

CREATE TABLE IF NOT EXISTS engine_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    kind        TEXT    NOT NULL,
    payload     TEXT    NOT NULL,
    recorded_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bets_status ON bets(status);
CREATE INDEX IF NOT EXISTS idx_bets_strategy ON bets(strategy);
CREATE INDEX IF NOT EXISTS idx_spins_round ON spins(round_id);
CREATE INDEX IF NOT EXISTS idx_events_kind ON engine_events(kind);
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub total_bets: i64,
    pub won_bets: i64,
    pub total_pnl: f64,
    pub pending_bets: i64,
    pub total_spins: i64,
    pub current_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub balance: f64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_db() -> Database {
        Database::open(":memory:").unwrap()
    }

    fn make_bet(strategy: &str, stake: f64) -> BetRow {
        BetRow {
            id: None,
            strategy: strategy.to_string(),
            target: "black".to_string(),
            stake,
            placed_amount: stake,
            gale_step: 0,
            keepalive: false,
            reason: "test".to_string(),
            status: "pending".to_string(),
            dry_run: true,
            placed_at: Utc::now(),
            resolved_at: None,
            settled_number: None,
            pnl: None,
        }
    }

    #[test]
    fn test_bet_roundtrip_and_stats() {
        let db = make_db();
        let id = db.insert_bet(&make_bet("martingale", 10.0)).unwrap();
        db.insert_bet(&make_bet("martingale", 20.0)).unwrap();
        db.resolve_bet(id, true, 26, 10.0).unwrap();

        let bets = db.list_recent_bets(10).unwrap();
        assert_eq!(bets.len(), 2);
        let resolved = bets.iter().find(|b| b.id == Some(id)).unwrap();
        assert_eq!(resolved.status, "won");
        assert_eq!(resolved.settled_number, Some(26));
        assert_eq!(resolved.pnl, Some(10.0));

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_bets, 1);
        assert_eq!(stats.won_bets, 1);
        assert_eq!(stats.pending_bets, 1);
        assert!((stats.total_pnl - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_spin_journal() {
        let db = make_db();
        db.record_spin(&SpinOutcome {
            id: None,
            round_id: "r-1".to_string(),
            number: 17,
            detected_color: Some("black".to_string()),
            confidence: Some(0.97),
            method: Some("ocr".to_string()),
            source: "detector".to_string(),
            observed_at: Utc::now(),
        })
        .unwrap();
        let spins = db.list_recent_spins(5).unwrap();
        assert_eq!(spins.len(), 1);
        assert_eq!(spins[0].number, 17);
        assert_eq!(spins[0].detected_color.as_deref(), Some("black"));
    }

    #[test]
    fn test_balance_restore() {
        let db = make_db();
        assert_eq!(db.get_balance().unwrap(), None);
        db.record_balance(1000.0).unwrap();
        db.record_balance(985.5).unwrap();
        assert_eq!(db.get_balance().unwrap(), Some(985.5));
        let history = db.get_balance_history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert!((history[0].balance - 985.5).abs() < 1e-9);
    }

    #[test]
    fn test_event_journal() {
        let db = make_db();
        db.insert_event("stop_triggered", r#"{"reason":"stop_loss_money"}"#)
            .unwrap();
        let events = db.list_recent_events(5).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "stop_triggered");
    }
}
