use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use sharpline::api::health::HealthState;
use sharpline::api::latency::LatencyStats;
use sharpline::bankroll::{compute_exposure, recommend_withdrawal, RiskLevel, WithdrawalInput};
use sharpline::clock::ManualClock;
use sharpline::config::{DetectorConfig, GuardrailConfig, MonitorConfig, WithdrawalPolicy};
use sharpline::detector::SignalDetector;
use sharpline::guardrail::{GuardrailEvaluator, LockoutStore, SessionTimer};
use sharpline::monitor::{StoreSource, SteamMonitor};
use sharpline::scorer;
use sharpline::state::{BetLedger, LineHistoryStore, SignalBook};
use sharpline::types::{
    BetRecord, BetStatus, BetType, GuardrailRule, MarketSnapshot, RuleAction, RuleType, SharpSide,
    SignalType, Strength,
};

fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 8, 15, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    kickoff() + Duration::seconds(secs)
}

fn snapshot(secs: i64, spread_home: f64, public_home: f64, money_home: f64) -> MarketSnapshot {
    MarketSnapshot {
        match_id: "kc-bal".to_string(),
        timestamp: at(secs),
        spread_home,
        spread_away: -spread_home,
        total: 46.5,
        moneyline_home: -150.0,
        moneyline_away: 130.0,
        public_pct_home: public_home,
        public_pct_away: 100.0 - public_home,
        money_pct_home: money_home,
        money_pct_away: 100.0 - money_home,
        sportsbook: "consensus".to_string(),
    }
}

fn bet(id: &str, stake: f64, league: &str, bet_type: BetType) -> BetRecord {
    BetRecord {
        id: id.to_string(),
        match_id: "kc-bal".to_string(),
        placed_at: at(0),
        settled_at: None,
        stake,
        odds: -110.0,
        status: BetStatus::Pending,
        result_profit: None,
        league: Some(league.to_string()),
        selection: Some("away".to_string()),
        bet_type: Some(bet_type),
    }
}

#[tokio::test]
async fn market_pipeline_from_snapshots_to_alerts() {
    let store = LineHistoryStore::new();
    // The public keeps backing home while the line runs toward away.
    store
        .append_batch(vec![
            snapshot(0, -3.0, 72.0, 50.0),
            snapshot(90, -1.5, 74.0, 52.0),
            snapshot(180, -0.5, 75.0, 55.0),
        ])
        .unwrap();

    let detector = SignalDetector::new(DetectorConfig::default());
    let signals = detector.detect(&store.history("kc-bal"));
    let types: Vec<SignalType> = signals.iter().map(|s| s.signal_type).collect();
    assert!(types.contains(&SignalType::SteamMove));
    assert!(types.contains(&SignalType::ReverseLine));

    let book = SignalBook::new();
    let active = book.record("kc-bal", signals);
    let latest = store.latest("kc-bal").unwrap();
    let result = scorer::score(&active, &latest);
    assert_eq!(result.sharp_side, SharpSide::Away);
    assert!(result.sharp_score < 50.0);
    assert!(result.has_reverse_line_movement);

    let monitor = SteamMonitor::new(
        Arc::new(StoreSource::new(store.clone())),
        MonitorConfig::default(),
        Arc::new(HealthState::new()),
        Arc::new(LatencyStats::new()),
    );
    let report = monitor.poll_once().await;
    assert_eq!(report.created, 1);
    let alerts = monitor.alerts();
    assert_eq!(alerts[0].strength, Strength::Strong);
    assert_eq!(alerts[0].movement, 2.5);

    // Dismissed alerts stay dismissed across polls.
    monitor.dismiss(&alerts[0].id).unwrap();
    monitor.poll_once().await;
    assert!(monitor.alerts().is_empty());
}

#[test]
fn bankroll_pipeline_from_bets_to_lockout() {
    let clock = ManualClock::new(at(7200));
    let ledger = BetLedger::new();
    ledger.place(bet("b1", 40.0, "NFL", BetType::Spread)).unwrap();
    ledger.place(bet("b2", 40.0, "NFL", BetType::Total)).unwrap();
    ledger.place(bet("b3", 40.0, "NCAAF", BetType::Spread)).unwrap();
    ledger.place(bet("b4", 200.0, "NFL", BetType::Moneyline)).unwrap();

    let exposure = compute_exposure(&ledger.all(), 1000.0);
    assert_eq!(exposure.total_exposure, 320.0);
    assert_eq!(exposure.risk_level, RiskLevel::High);
    assert_eq!(exposure.largest_bet.unwrap().id, "b4");

    for (i, id) in ["b1", "b2", "b3"].iter().enumerate() {
        ledger
            .settle(id, BetStatus::Lost, None, at(3600 + i as i64 * 60))
            .unwrap();
    }

    let evaluator = GuardrailEvaluator::new(
        GuardrailConfig::default(),
        LockoutStore::new(clock.clone()),
        SessionTimer::new(),
        clock.clone(),
    );
    let rules = vec![
        GuardrailRule {
            rule_type: RuleType::LossStreakLockout,
            threshold: 3.0,
            action: RuleAction::Lockout,
            enabled: true,
        },
        GuardrailRule {
            rule_type: RuleType::DailyLossLimit,
            threshold: 100.0,
            action: RuleAction::Block,
            enabled: true,
        },
    ];
    let results = evaluator.evaluate(&ledger.all(), &rules);
    assert!(results.iter().all(|r| r.is_triggered));
    assert_eq!(results[1].current_value, 120.0);

    let lockout = evaluator.lockout().state();
    assert!(lockout.is_locked);
    assert_eq!(lockout.locked_until, Some(at(7200) + Duration::hours(24)));

    clock.advance(Duration::hours(24));
    assert!(!evaluator.lockout().is_locked());

    let withdrawal = recommend_withdrawal(
        &WithdrawalInput {
            current_bankroll: 1500.0,
            starting_bankroll: 1000.0,
            monthly_target: 500.0,
            expected_edge: 0.03,
            trailing_roi: None,
        },
        &WithdrawalPolicy::default(),
    );
    assert_eq!(withdrawal.protected_bankroll, 1000.0);
    assert!(withdrawal.growth_reserve > 0.0);
    assert!(withdrawal.safe_amount <= withdrawal.recommended_amount);
    assert!(withdrawal.recommended_amount <= withdrawal.aggressive_amount);
}
