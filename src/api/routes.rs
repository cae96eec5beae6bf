use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::health::{HealthReport, HealthState};
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::bankroll::{
    compute_exposure, recommend_withdrawal, RiskExposure, WithdrawalInput, WithdrawalRecommendation,
};
use crate::clock::SharedClock;
use crate::config::WithdrawalPolicy;
use crate::detector::SignalDetector;
use crate::error::AppError;
use crate::guardrail::GuardrailEvaluator;
use crate::monitor::SteamMonitor;
use crate::scorer;
use crate::state::{BetLedger, LineHistoryStore, SignalBook};
use crate::types::{
    BetRecord, BetStatus, BetType, GuardrailRule, LockoutState, MarketSnapshot,
    PsychologicalGuardrail, SharpScoreResult, SharpSignal, SteamMove,
};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<LineHistoryStore>,
    pub signals: Arc<SignalBook>,
    pub detector: Arc<SignalDetector>,
    pub monitor: Arc<SteamMonitor>,
    pub ledger: Arc<BetLedger>,
    pub evaluator: Arc<GuardrailEvaluator>,
    pub rules: Arc<RwLock<Vec<GuardrailRule>>>,
    pub bankroll: Arc<RwLock<WithdrawalInput>>,
    pub withdrawal_policy: Arc<WithdrawalPolicy>,
    pub clock: SharedClock,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/snapshots", post(post_snapshots))
        .route("/matches", get(get_matches))
        .route(
            "/matches/:id/signals",
            get(get_match_signals).delete(delete_match_signals),
        )
        .route("/matches/:id/score", get(get_match_score))
        .route("/alerts", get(get_alerts))
        .route("/alerts/clear", post(post_alerts_clear))
        .route("/alerts/:id/dismiss", post(post_alert_dismiss))
        .route("/bets", get(get_bets).post(post_bet))
        .route("/bets/:id/settle", post(post_bet_settle))
        .route("/guardrails/rules", get(get_rules).put(put_rules))
        .route("/guardrails/evaluate", post(post_evaluate))
        .route(
            "/lockout",
            get(get_lockout).post(post_lockout).delete(delete_lockout),
        )
        .route("/session/start", post(post_session_start))
        .route("/session/end", post(post_session_end))
        .route("/exposure", get(get_exposure))
        .route("/bankroll", get(get_bankroll).put(put_bankroll))
        .route("/withdrawal", get(get_withdrawal).post(post_withdrawal))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PlaceBetRequest {
    pub id: Option<String>,
    pub match_id: String,
    pub stake: f64,
    pub odds: f64,
    pub placed_at: Option<DateTime<Utc>>,
    pub league: Option<String>,
    pub selection: Option<String>,
    pub bet_type: Option<BetType>,
}

#[derive(Deserialize)]
pub struct SettleBetRequest {
    pub status: BetStatus,
    pub result_profit: Option<f64>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct LockoutRequest {
    pub reason: String,
    pub hours: Option<f64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct MatchSummary {
    pub match_id: String,
    pub snapshots: usize,
    pub latest: Option<MarketSnapshot>,
}

#[derive(Serialize)]
pub struct EvaluationResponse {
    pub results: Vec<PsychologicalGuardrail>,
    pub lockout: LockoutState,
}

// ---------------------------------------------------------------------------
// Handlers: market side
// ---------------------------------------------------------------------------

async fn post_snapshots(
    State(state): State<ApiState>,
    Json(snapshots): Json<Vec<MarketSnapshot>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let accepted = state.store.append_batch(snapshots)?;
    Ok(Json(json!({ "accepted": accepted })))
}

async fn get_matches(State(state): State<ApiState>) -> Json<Vec<MatchSummary>> {
    let matches = state
        .store
        .match_ids()
        .into_iter()
        .map(|match_id| MatchSummary {
            snapshots: state.store.history(&match_id).len(),
            latest: state.store.latest(&match_id),
            match_id,
        })
        .collect();
    Json(matches)
}

/// Re-run detection over the stored history and fold the result into the
/// match's active signal set.
fn refresh_signals(state: &ApiState, match_id: &str) -> Vec<SharpSignal> {
    let fresh = state.detector.detect(&state.store.history(match_id));
    state.signals.record(match_id, fresh)
}

async fn get_match_signals(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Json<Vec<SharpSignal>> {
    Json(refresh_signals(&state, &match_id))
}

async fn delete_match_signals(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Json<serde_json::Value> {
    state.signals.clear(&match_id);
    Json(json!({ "cleared": match_id }))
}

async fn get_match_score(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Json<SharpScoreResult> {
    let active = refresh_signals(&state, &match_id);
    let result = match state.store.latest(&match_id) {
        Some(latest) => scorer::score(&active, &latest),
        None => scorer::score_signals(&match_id, &active),
    };
    Json(result)
}

async fn get_alerts(State(state): State<ApiState>) -> Json<Vec<SteamMove>> {
    Json(state.monitor.alerts())
}

async fn post_alert_dismiss(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<SteamMove>, AppError> {
    Ok(Json(state.monitor.dismiss(&id)?))
}

async fn post_alerts_clear(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let cleared = state.monitor.clear_all();
    Json(json!({ "cleared": cleared }))
}

// ---------------------------------------------------------------------------
// Handlers: bankroll side
// ---------------------------------------------------------------------------

async fn get_bets(State(state): State<ApiState>) -> Json<Vec<BetRecord>> {
    Json(state.ledger.all())
}

async fn post_bet(
    State(state): State<ApiState>,
    Json(req): Json<PlaceBetRequest>,
) -> Result<Json<BetRecord>, AppError> {
    let lockout = state.evaluator.lockout().state();
    if lockout.is_locked {
        let reason = lockout.reason.unwrap_or_else(|| "self-exclusion".to_string());
        return Err(AppError::LockedOut(reason));
    }

    let bet = BetRecord {
        id: req.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        match_id: req.match_id,
        placed_at: req.placed_at.unwrap_or_else(|| state.clock.now()),
        settled_at: None,
        stake: req.stake,
        odds: req.odds,
        status: BetStatus::Pending,
        result_profit: None,
        league: req.league,
        selection: req.selection,
        bet_type: req.bet_type,
    };
    state.ledger.place(bet.clone())?;
    Ok(Json(bet))
}

async fn post_bet_settle(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<SettleBetRequest>,
) -> Result<Json<BetRecord>, AppError> {
    let settled_at = req.settled_at.unwrap_or_else(|| state.clock.now());
    let bet = state
        .ledger
        .settle(&id, req.status, req.result_profit, settled_at)?;
    Ok(Json(bet))
}

async fn get_rules(State(state): State<ApiState>) -> Json<Vec<GuardrailRule>> {
    Json(state.rules.read().clone())
}

async fn put_rules(
    State(state): State<ApiState>,
    Json(rules): Json<Vec<GuardrailRule>>,
) -> Result<Json<Vec<GuardrailRule>>, AppError> {
    if let Some(bad) = rules.iter().find(|r| !r.threshold.is_finite() || r.threshold < 0.0) {
        return Err(AppError::InvalidRule(format!(
            "{} threshold must be a non-negative number",
            bad.rule_type
        )));
    }
    *state.rules.write() = rules.clone();
    Ok(Json(rules))
}

async fn post_evaluate(State(state): State<ApiState>) -> Json<EvaluationResponse> {
    let rules = state.rules.read().clone();
    let results = state.evaluator.evaluate(&state.ledger.all(), &rules);
    Json(EvaluationResponse {
        results,
        lockout: state.evaluator.lockout().state(),
    })
}

async fn get_lockout(State(state): State<ApiState>) -> Json<LockoutState> {
    Json(state.evaluator.lockout().state())
}

async fn post_lockout(
    State(state): State<ApiState>,
    Json(req): Json<LockoutRequest>,
) -> Json<LockoutState> {
    let hours = req
        .hours
        .unwrap_or(state.evaluator.config().lockout_hours);
    Json(state.evaluator.lockout().trigger_lockout(&req.reason, hours))
}

async fn delete_lockout(State(state): State<ApiState>) -> Json<LockoutState> {
    Json(state.evaluator.lockout().clear_lockout())
}

async fn post_session_start(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let started_at = state.evaluator.session().start(state.clock.now());
    Json(json!({ "started_at": started_at }))
}

async fn post_session_end(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let minutes = state.evaluator.session().end(state.clock.now());
    Json(json!({ "minutes": minutes }))
}

async fn get_exposure(State(state): State<ApiState>) -> Json<RiskExposure> {
    let bankroll = state.bankroll.read().current_bankroll;
    Json(compute_exposure(&state.ledger.pending(), bankroll))
}

async fn get_bankroll(State(state): State<ApiState>) -> Json<WithdrawalInput> {
    Json(state.bankroll.read().clone())
}

async fn put_bankroll(
    State(state): State<ApiState>,
    Json(input): Json<WithdrawalInput>,
) -> Json<WithdrawalInput> {
    *state.bankroll.write() = input.clone();
    Json(input)
}

async fn get_withdrawal(State(state): State<ApiState>) -> Json<WithdrawalRecommendation> {
    let input = state.bankroll.read().clone();
    Json(recommend_withdrawal(&input, &state.withdrawal_policy))
}

async fn post_withdrawal(
    State(state): State<ApiState>,
    Json(input): Json<WithdrawalInput>,
) -> Json<WithdrawalRecommendation> {
    Json(recommend_withdrawal(&input, &state.withdrawal_policy))
}

// ---------------------------------------------------------------------------
// Handlers: ops
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthReport> {
    Json(state.health.report())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySummary> {
    Json(state.latency.summary())
}
