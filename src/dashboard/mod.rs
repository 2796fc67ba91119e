use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::bot::EngineContext;
use crate::db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Arc<RwLock<EngineContext>>,
    pub dry_run: bool,
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/state", get(state_handler))
        .route("/api/bets", get(bets_handler))
        .route("/api/spins", get(spins_handler))
        .route("/api/events", get(events_handler))
        .route("/api/balance-history", get(balance_history_handler))
        .route("/api/control/stop", post(stop_handler))
        .route("/api/control/restart", post(restart_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the dashboard HTML page, injecting the dry_run flag.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = DASHBOARD_HTML.replace(
        r#"<body>"#,
        &format!(r#"<body data-dryrun="{}">"#, state.dry_run),
    );
    Html(html)
}

/// GET /api/stats
async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .get_stats()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/state — live engine snapshot (strategies, cycles, streaks)
async fn state_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.read().await.snapshot();
    Json(snapshot)
}

/// GET /api/bets
async fn bets_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_recent_bets(50)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/spins
async fn spins_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_recent_spins(30)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/events
async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_recent_events(30)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/balance-history
async fn balance_history_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .get_balance_history(200)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// POST /api/control/stop — operator halt; open cycles are abandoned on restart
async fn stop_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.write().await.stop();
    Json(json!({ "stopped": true }))
}

/// POST /api/control/restart — clear a stop latch and resume betting
async fn restart_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    engine.restart();
    Json(json!({ "stopped": engine.halted() }))
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Roulette Bot Dashboard</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  .badge { padding: .2rem .6rem; border-radius: 4px; font-size: .75rem; font-weight: 700; text-transform: uppercase; }
  .badge.dryrun { background: #ff9800; color: #000; }
  .badge.live { background: var(--green); color: #000; }
  .badge.stopped { background: var(--red); color: #000; }
  .status-dot { width: 10px; height: 10px; border-radius: 50%; background: var(--green); display: inline-block; animation: pulse 1.5s infinite; }
  @keyframes pulse { 0%,100% { opacity: 1; } 50% { opacity: .3; } }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }
  .stats-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 1rem; }
  .stat-card { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 1.2rem; }
  .stat-card .label { color: var(--muted); font-size: .8rem; text-transform: uppercase; letter-spacing: .06em; margin-bottom: .4rem; }
  .stat-card .value { font-size: 1.7rem; font-weight: 700; }
  .value.pos { color: var(--green); }
  .value.neg { color: var(--red); }
  .pos { color: var(--green); }
  .neg { color: var(--red); }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; display: flex; justify-content: space-between; align-items: center; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  tr:last-child td { border-bottom: none; }
  .pill { display: inline-block; padding: .15rem .55rem; border-radius: 20px; font-size: .75rem; font-weight: 600; }
  .pill.pending { background: rgba(108,99,255,.2); color: var(--accent); }
  .pill.won { background: rgba(0,200,150,.15); color: var(--green); }
  .pill.lost { background: rgba(255,79,106,.15); color: var(--red); }
  .pill.active { background: rgba(0,200,150,.15); color: var(--green); }
  .pill.bench { background: rgba(136,136,170,.15); color: var(--muted); }
  .pocket { display: inline-flex; align-items: center; justify-content: center; width: 32px; height: 32px; border-radius: 50%; font-weight: 700; font-size: .85rem; margin: .15rem; color: #fff; }
  .pocket.red { background: #c0392b; }
  .pocket.black { background: #2c3e50; }
  .pocket.green { background: #27ae60; }
  #spin-strip { padding: .8rem 1rem; }
  #chart-container { padding: 1rem; height: 200px; position: relative; }
  canvas { width: 100% !important; }
  .two-col { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; }
  @media (max-width: 768px) { .two-col { grid-template-columns: 1fr; } }
  .empty { color: var(--muted); text-align: center; padding: 2rem; font-size: .9rem; }
  .refresh-btn { background: none; border: 1px solid var(--border); color: var(--muted); padding: .3rem .8rem; border-radius: 6px; cursor: pointer; font-size: .8rem; }
  .refresh-btn:hover { border-color: var(--accent); color: var(--accent); }
</style>
</head>
<body>
<header>
  <span class="status-dot" id="dot"></span>
  <h1>&#127920; Roulette Bot</h1>
  <span class="badge" id="mode-badge">…</span>
  <span class="badge stopped" id="stop-badge" style="display:none;">Stopped</span>
  <button class="refresh-btn" id="control-btn" style="display:none;"></button>
  <span style="margin-left:auto;color:var(--muted);font-size:.8rem;" id="last-updated"></span>
</header>

<main>
  <!-- Stats row -->
  <div class="stats-grid" id="stats-grid">
    <div class="stat-card"><div class="label">Balance</div><div class="value" id="s-balance">–</div></div>
    <div class="stat-card"><div class="label">Session P&L</div><div class="value" id="s-pnl">–</div></div>
    <div class="stat-card"><div class="label">Bets Settled</div><div class="value" id="s-bets">–</div></div>
    <div class="stat-card"><div class="label">Win Rate</div><div class="value" id="s-winrate">–</div></div>
    <div class="stat-card"><div class="label">Spins Seen</div><div class="value" id="s-spins">–</div></div>
    <div class="stat-card"><div class="label">Active Strategy</div><div class="value" id="s-active" style="font-size:1.2rem;">–</div></div>
  </div>

  <!-- Strategies -->
  <div class="panel">
    <div class="panel-header">Strategies</div>
    <table>
      <thead><tr><th>Strategy</th><th>Status</th><th>Score</th><th>Bets</th><th>Win Rate</th><th>Cycles</th><th>Net</th><th>Gale Step</th><th>Streaks</th></tr></thead>
      <tbody id="strategies-tbody"><tr><td colspan="9" class="empty">Loading…</td></tr></tbody>
    </table>
  </div>

  <!-- Recent spins -->
  <div class="panel">
    <div class="panel-header">Recent Spins</div>
    <div id="spin-strip"><span class="empty">Loading…</span></div>
  </div>

  <!-- Balance chart -->
  <div class="panel">
    <div class="panel-header">Balance History <button class="refresh-btn" onclick="loadAll()">&#8635; Refresh</button></div>
    <div id="chart-container">
      <canvas id="balance-chart"></canvas>
    </div>
  </div>

  <div class="two-col">
    <!-- Bets -->
    <div class="panel">
      <div class="panel-header">Recent Bets</div>
      <table>
        <thead><tr><th>Time</th><th>Strategy</th><th>Target</th><th>Stake</th><th>Step</th><th>P&L</th><th>Status</th></tr></thead>
        <tbody id="bets-tbody"><tr><td colspan="7" class="empty">Loading…</td></tr></tbody>
      </table>
    </div>

    <!-- Engine events -->
    <div class="panel">
      <div class="panel-header">Engine Events</div>
      <table>
        <thead><tr><th>Time</th><th>Kind</th><th>Detail</th></tr></thead>
        <tbody id="events-tbody"><tr><td colspan="3" class="empty">Loading…</td></tr></tbody>
      </table>
    </div>
  </div>
</main>

<script>
const fmt = new Intl.NumberFormat('en-US', { style:'currency', currency:'USD', minimumFractionDigits:2 });
const pct = v => (v*100).toFixed(1)+'%';
const RED = new Set([1,3,5,7,9,12,14,16,18,19,21,23,25,27,30,32,34,36]);
const pocketClass = n => n === 0 ? 'green' : (RED.has(n) ? 'red' : 'black');
const timeAgo = ts => {
  const d = (Date.now() - new Date(ts).getTime()) / 1000;
  if (d < 60) return Math.round(d)+'s ago';
  if (d < 3600) return Math.round(d/60)+'m ago';
  return new Date(ts).toLocaleTimeString();
};

async function loadStats() {
  const r = await fetch('/api/stats');
  if (!r.ok) return;
  const s = await r.json();
  document.getElementById('s-balance').textContent = fmt.format(s.current_balance);
  document.getElementById('s-bets').textContent = s.total_bets;
  const wr = s.total_bets > 0 ? pct(s.won_bets / s.total_bets) : '–';
  document.getElementById('s-winrate').textContent = wr;
  const pnlEl = document.getElementById('s-pnl');
  pnlEl.textContent = (s.total_pnl >= 0 ? '+' : '') + fmt.format(s.total_pnl);
  pnlEl.className = 'value ' + (s.total_pnl >= 0 ? 'pos' : 'neg');
  document.getElementById('s-spins').textContent = s.total_spins;
}

async function loadState() {
  const r = await fetch('/api/state');
  if (!r.ok) return;
  const st = await r.json();
  document.getElementById('s-active').textContent = st.active_strategy;
  const stopBadge = document.getElementById('stop-badge');
  const controlBtn = document.getElementById('control-btn');
  controlBtn.style.display = '';
  if (st.stopped) {
    stopBadge.style.display = '';
    stopBadge.textContent = 'Stopped: ' + st.stopped.replace(/_/g,' ');
    controlBtn.textContent = 'Restart session';
    controlBtn.onclick = () => control('restart');
  } else {
    stopBadge.style.display = 'none';
    controlBtn.textContent = 'Stop';
    controlBtn.onclick = () => control('stop');
  }

  const tbody = document.getElementById('strategies-tbody');
  if (!st.strategies.length) {
    tbody.innerHTML = '<tr><td colspan="9" class="empty">No strategies loaded</td></tr>';
    return;
  }
  tbody.innerHTML = st.strategies.map(s => {
    const rec = s.record;
    const wr = rec.total_bets > 0 ? pct(rec.wins / rec.total_bets) : '–';
    const net = rec.profit_total - rec.loss_total;
    const step = s.cycle != null ? s.cycle.gale_step : '–';
    const streaks = [];
    if (s.streaks.color) streaks.push(`${s.streaks.color} ×${s.streaks.color_len}`);
    if (s.streaks.parity) streaks.push(`${s.streaks.parity} ×${s.streaks.parity_len}`);
    return `<tr>
      <td>${s.name}</td>
      <td><span class="pill ${s.active ? 'active' : 'bench'}">${s.active ? 'Active' : 'Bench'}</span></td>
      <td>${s.score.toFixed(3)}</td>
      <td>${rec.total_bets}</td>
      <td>${wr}</td>
      <td>${rec.cycles_won}/${rec.cycles_completed}</td>
      <td class="${net >= 0 ? 'pos' : 'neg'}">${(net >= 0 ? '+' : '') + fmt.format(net)}</td>
      <td>${step}</td>
      <td>${streaks.join(', ') || '–'}</td>
    </tr>`;
  }).join('');
}

async function loadSpins() {
  const r = await fetch('/api/spins');
  if (!r.ok) return;
  const spins = await r.json();
  const strip = document.getElementById('spin-strip');
  if (!spins.length) { strip.innerHTML = '<span class="empty">No spins yet</span>'; return; }
  strip.innerHTML = spins.map(s =>
    `<span class="pocket ${pocketClass(s.number)}" title="round ${s.round_id} (${s.source})">${s.number}</span>`
  ).join('');
}

async function loadBets() {
  const r = await fetch('/api/bets');
  if (!r.ok) return;
  const bets = await r.json();
  const tbody = document.getElementById('bets-tbody');
  if (!bets.length) { tbody.innerHTML = '<tr><td colspan="7" class="empty">No bets yet</td></tr>'; return; }
  tbody.innerHTML = bets.slice(0,20).map(b => {
    const pnl = b.pnl != null ? (b.pnl >= 0 ? '+' : '') + fmt.format(b.pnl) : '–';
    const pnlClass = b.pnl != null ? (b.pnl >= 0 ? 'pos' : 'neg') : '';
    const name = b.keepalive ? 'keepalive' : b.strategy;
    return `<tr>
      <td>${timeAgo(b.placed_at)}</td>
      <td>${name}</td>
      <td>${b.target}</td>
      <td>${fmt.format(b.placed_amount)}</td>
      <td>${b.gale_step}</td>
      <td class="${pnlClass}">${pnl}</td>
      <td><span class="pill ${b.status}">${b.status}</span></td>
    </tr>`;
  }).join('');
}

async function loadEvents() {
  const r = await fetch('/api/events');
  if (!r.ok) return;
  const events = await r.json();
  const tbody = document.getElementById('events-tbody');
  if (!events.length) { tbody.innerHTML = '<tr><td colspan="3" class="empty">No events yet</td></tr>'; return; }
  tbody.innerHTML = events.slice(0,20).map(e => {
    let detail = '';
    try {
      const p = JSON.parse(e.payload);
      if (e.kind === 'cycle_resolved') detail = `${p.strategy}: ${p.end.replace(/_/g,' ')} (net ${fmt.format(p.net)})`;
      else if (e.kind === 'stop_triggered') detail = `${p.reason.replace(/_/g,' ')} at ${fmt.format(p.balance)}`;
      else if (e.kind === 'strategy_switched') detail = `${p.from} → ${p.to} (${p.from_score.toFixed(3)} vs ${p.to_score.toFixed(3)})`;
      else detail = e.payload.slice(0, 80);
    } catch { detail = e.payload.slice(0, 80); }
    return `<tr>
      <td>${timeAgo(e.recorded_at)}</td>
      <td>${e.kind.replace(/_/g,' ')}</td>
      <td>${detail}</td>
    </tr>`;
  }).join('');
}

async function loadBalanceHistory() {
  const r = await fetch('/api/balance-history');
  if (!r.ok) return;
  const history = await r.json();
  if (!history.length) return;

  // Reverse so oldest first
  const sorted = history.slice().reverse();
  const labels = sorted.map(h => new Date(h.recorded_at).toLocaleTimeString());
  const data = sorted.map(h => h.balance);

  drawChart(labels, data);
}

function drawChart(labels, data) {
  const canvas = document.getElementById('balance-chart');
  const ctx = canvas.getContext('2d');
  const W = canvas.parentElement.clientWidth - 32;
  const H = 160;
  canvas.width = W;
  canvas.height = H;

  if (data.length < 2) return;
  const min = Math.min(...data) * 0.98;
  const max = Math.max(...data) * 1.02;
  const range = max - min || 1;

  ctx.clearRect(0, 0, W, H);

  // Grid lines
  ctx.strokeStyle = '#2a2d3a';
  ctx.lineWidth = 1;
  for (let i = 0; i <= 4; i++) {
    const y = H - (i / 4) * H;
    ctx.beginPath(); ctx.moveTo(0, y); ctx.lineTo(W, y); ctx.stroke();
  }

  // Line
  const step = W / (data.length - 1);
  const toY = v => H - ((v - min) / range) * H;

  // Fill gradient
  const grad = ctx.createLinearGradient(0, 0, 0, H);
  grad.addColorStop(0, 'rgba(108,99,255,0.4)');
  grad.addColorStop(1, 'rgba(108,99,255,0)');
  ctx.fillStyle = grad;
  ctx.beginPath();
  ctx.moveTo(0, toY(data[0]));
  data.forEach((v, i) => ctx.lineTo(i * step, toY(v)));
  ctx.lineTo(W, H); ctx.lineTo(0, H); ctx.closePath(); ctx.fill();

  // Stroke
  ctx.strokeStyle = '#6c63ff';
  ctx.lineWidth = 2;
  ctx.beginPath();
  data.forEach((v, i) => i === 0 ? ctx.moveTo(0, toY(v)) : ctx.lineTo(i * step, toY(v)));
  ctx.stroke();
}

async function loadAll() {
  await Promise.all([loadStats(), loadState(), loadSpins(), loadBets(), loadEvents(), loadBalanceHistory()]);
  document.getElementById('last-updated').textContent = 'Updated ' + new Date().toLocaleTimeString();
}

async function control(action) {
  if (action === 'stop' && !confirm('Stop the session? The open cycle is abandoned on restart.')) return;
  await fetch('/api/control/' + action, { method: 'POST' });
  loadAll();
}

// Auto-refresh every 5 seconds
loadAll();
setInterval(loadAll, 5000);

// Set mode badge from server-injected data attribute
document.addEventListener('DOMContentLoaded', () => {
  const isDryRun = document.body.dataset.dryrun === 'true';
  const badge = document.getElementById('mode-badge');
  badge.textContent = isDryRun ? 'Dry Run' : 'Live';
  badge.className = 'badge ' + (isDryRun ? 'dryrun' : 'live');
});
</script>
</body>
</html>"#;
