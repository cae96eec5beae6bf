use serde::{Deserialize, Serialize};

use crate::config::WithdrawalPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalInput {
    pub current_bankroll: f64,
    pub starting_bankroll: f64,
    /// Monthly income the bettor wants to draw.
    #[serde(default)]
    pub monthly_target: f64,
    /// Expected edge per unit staked, e.g. 0.03 for 3%.
    #[serde(default)]
    pub expected_edge: f64,
    /// Trailing return on turnover, when a track record exists.
    #[serde(default)]
    pub trailing_roi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRecommendation {
    /// Never withdraw below this.
    pub protected_bankroll: f64,
    /// Profit kept in the bankroll for compounding.
    pub growth_reserve: f64,
    pub safe_amount: f64,
    pub recommended_amount: f64,
    pub aggressive_amount: f64,
    /// Expected monthly profit on what stays in the bankroll after the recommended withdrawal.
    pub projected_monthly_profit: f64,
    /// 0..=100
    pub sustainability_score: u32,
    pub is_sustainable: bool,
    pub rationale: String,
}

/// Recommend how much profit can be withdrawn without eating into the
/// starting bankroll. Only profit above the starting bankroll is ever
/// withdrawable; with no profit every amount is zero.
pub fn recommend_withdrawal(input: &WithdrawalInput, policy: &WithdrawalPolicy) -> WithdrawalRecommendation {
    let starting = finite_or_zero(input.starting_bankroll).max(0.0);
    let current = finite_or_zero(input.current_bankroll);

    if current <= starting {
        return WithdrawalRecommendation {
            protected_bankroll: starting,
            growth_reserve: 0.0,
            safe_amount: 0.0,
            recommended_amount: 0.0,
            aggressive_amount: 0.0,
            projected_monthly_profit: 0.0,
            sustainability_score: 0,
            is_sustainable: false,
            rationale: format!(
                "bankroll {current:.2} is not above starting bankroll {starting:.2}; nothing to withdraw"
            ),
        };
    }

    let profit = current - starting;
    let growth_reserve = profit * policy.growth_reserve_ratio.clamp(0.0, 1.0);
    let withdrawable = profit - growth_reserve;

    let safe = withdrawable * policy.safe_fraction.clamp(0.0, 1.0);
    let aggressive = withdrawable;
    let target = finite_or_zero(input.monthly_target).max(0.0);
    let recommended = target.clamp(safe, aggressive);

    let edge = effective_edge(input.expected_edge, input.trailing_roi);
    let projected = (current - recommended) * edge * policy.monthly_turnover.max(0.0);

    // How much of the target the remaining bankroll can earn back, and how many
    // months of target the leftover profit could absorb.
    let (coverage, cushion_months) = if target > 0.0 {
        (projected / target, (profit - recommended) / target)
    } else {
        (1.0, 3.0)
    };
    let score = 60.0 * coverage.clamp(0.0, 1.0) + 40.0 * (cushion_months / 3.0).clamp(0.0, 1.0);
    let sustainability_score = score.round().clamp(0.0, 100.0) as u32;
    let is_sustainable = sustainability_score >= policy.sustainable_score;

    WithdrawalRecommendation {
        protected_bankroll: starting,
        growth_reserve,
        safe_amount: safe,
        recommended_amount: recommended,
        aggressive_amount: aggressive,
        projected_monthly_profit: projected,
        sustainability_score,
        is_sustainable,
        rationale: format!(
            "withdraw {recommended:.2} of {profit:.2} profit; remaining bankroll projects {projected:.2}/month at {:.1}% edge",
            edge * 100.0
        ),
    }
}

/// Blend the stated edge with the realised ROI when there is one. Never negative.
fn effective_edge(expected: f64, trailing_roi: Option<f64>) -> f64 {
    let expected = finite_or_zero(expected);
    let edge = match trailing_roi.map(finite_or_zero) {
        Some(roi) => (expected + roi) / 2.0,
        None => expected,
    };
    edge.max(0.0)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
