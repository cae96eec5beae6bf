use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::risk_bands;
use crate::types::{BetRecord, BetStatus};

/// Group key used when a bet carries no value for the dimension.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < risk_bands::LOW_MAX {
            RiskLevel::Low
        } else if ratio < risk_bands::MODERATE_MAX {
            RiskLevel::Moderate
        } else if ratio < risk_bands::HIGH_MAX {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureBucket {
    pub key: String,
    pub total_stake: f64,
    pub count: usize,
    /// Share of all pending stake, 0..=100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskExposure {
    pub total_exposure: f64,
    pub bet_count: usize,
    pub bankroll: f64,
    /// Pending stake over bankroll. `None` when the bankroll is not positive.
    pub exposure_ratio: Option<f64>,
    pub risk_level: RiskLevel,
    pub by_league: Vec<ExposureBucket>,
    pub by_selection: Vec<ExposureBucket>,
    pub by_bet_type: Vec<ExposureBucket>,
    pub largest_bet: Option<BetRecord>,
}

/// Current exposure from every pending bet in `bets`. Settled bets are ignored,
/// so the whole ledger can be passed in.
pub fn compute_exposure(bets: &[BetRecord], bankroll: f64) -> RiskExposure {
    let pending: Vec<&BetRecord> = bets
        .iter()
        .filter(|b| b.status == BetStatus::Pending && b.stake.is_finite() && b.stake > 0.0)
        .collect();
    let total: f64 = pending.iter().map(|b| b.stake).sum();

    let exposure_ratio = (bankroll.is_finite() && bankroll > 0.0).then(|| total / bankroll);
    let risk_level = match exposure_ratio {
        Some(ratio) => RiskLevel::from_ratio(ratio),
        None if total > 0.0 => RiskLevel::Critical,
        None => RiskLevel::Low,
    };

    let largest_bet = pending
        .iter()
        .copied()
        .max_by(|a, b| a.stake.total_cmp(&b.stake).then_with(|| b.id.cmp(&a.id)))
        .cloned();

    RiskExposure {
        total_exposure: total,
        bet_count: pending.len(),
        bankroll,
        exposure_ratio,
        risk_level,
        by_league: bucket(&pending, total, |b| b.league.clone()),
        by_selection: bucket(&pending, total, |b| b.selection.clone()),
        by_bet_type: bucket(&pending, total, |b| b.bet_type.map(|t| t.to_string())),
        largest_bet,
    }
}

/// Buckets sorted by stake descending, then key.
fn bucket<F>(pending: &[&BetRecord], total: f64, key_of: F) -> Vec<ExposureBucket>
where
    F: Fn(&BetRecord) -> Option<String>,
{
    let mut groups: HashMap<String, (f64, usize)> = HashMap::new();
    for bet in pending {
        let key = key_of(bet)
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += bet.stake;
        entry.1 += 1;
    }

    let mut buckets: Vec<ExposureBucket> = groups
        .into_iter()
        .map(|(key, (stake, count))| ExposureBucket {
            key,
            total_stake: stake,
            count,
            percentage: if total > 0.0 { stake / total * 100.0 } else { 0.0 },
        })
        .collect();
    buckets.sort_by(|a, b| {
        b.total_stake
            .total_cmp(&a.total_stake)
            .then_with(|| a.key.cmp(&b.key))
    });
    buckets
}
