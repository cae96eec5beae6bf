//! Fixture builders shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::types::{BetRecord, BetStatus, MarketSnapshot};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 3, 17, 0, 0).unwrap()
}

pub fn secs(n: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(n)
}

/// Snapshot with a balanced money split mirroring the public split.
pub fn snap(match_id: &str, ts: DateTime<Utc>, spread_home: f64, public_home: f64) -> MarketSnapshot {
    MarketSnapshot {
        match_id: match_id.to_string(),
        timestamp: ts,
        spread_home,
        spread_away: -spread_home,
        total: 45.0,
        moneyline_home: -110.0,
        moneyline_away: -110.0,
        public_pct_home: public_home,
        public_pct_away: 100.0 - public_home,
        money_pct_home: public_home,
        money_pct_away: 100.0 - public_home,
        sportsbook: "consensus".to_string(),
    }
}

pub fn with_total(mut s: MarketSnapshot, total: f64) -> MarketSnapshot {
    s.total = total;
    s
}

pub fn with_money(mut s: MarketSnapshot, money_home: f64) -> MarketSnapshot {
    s.money_pct_home = money_home;
    s.money_pct_away = 100.0 - money_home;
    s
}

pub fn pending_bet(id: &str, stake: f64, placed_at: DateTime<Utc>) -> BetRecord {
    BetRecord {
        id: id.to_string(),
        match_id: format!("match-{id}"),
        placed_at,
        settled_at: None,
        stake,
        odds: -110.0,
        status: BetStatus::Pending,
        result_profit: None,
        league: None,
        selection: None,
        bet_type: None,
    }
}

/// A bet already settled `settled_after` seconds after `placed_at`.
pub fn settled_bet(
    id: &str,
    stake: f64,
    status: BetStatus,
    placed_at: DateTime<Utc>,
    settled_after: i64,
) -> BetRecord {
    let profit = match status {
        BetStatus::Won => stake * 100.0 / 110.0,
        BetStatus::Lost => -stake,
        _ => 0.0,
    };
    BetRecord {
        settled_at: Some(placed_at + Duration::seconds(settled_after)),
        status,
        result_profit: Some(profit),
        ..pending_bet(id, stake, placed_at)
    }
}
