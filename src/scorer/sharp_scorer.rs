use std::collections::BTreeSet;

use crate::config::score_weights::*;
use crate::types::{
    MarketSnapshot, SharpScoreResult, SharpSide, SharpSignal, Side, SignalType, Strength,
};

/// Differences below this are treated as a tie.
const TIE_EPS: f64 = 1e-9;

/// Aggregate a match's active signals and its latest snapshot into a sharp score.
pub fn score(signals: &[SharpSignal], snapshot: &MarketSnapshot) -> SharpScoreResult {
    aggregate(&snapshot.match_id, signals, Some(snapshot))
}

/// Same as [`score`] for a match with no snapshot on hand; the money-flow skew
/// term is simply absent.
pub fn score_signals(match_id: &str, signals: &[SharpSignal]) -> SharpScoreResult {
    aggregate(match_id, signals, None)
}

/// Composite sharp score (50 = no lean, higher = home/over, lower = away/under).
/// Factors: one weighted delta per signal, plus the snapshot's money-vs-public skew.
fn aggregate(
    match_id: &str,
    signals: &[SharpSignal],
    snapshot: Option<&MarketSnapshot>,
) -> SharpScoreResult {
    let mut net = 0.0;
    // Indexed home, away, over, under.
    let mut per_side = [0.0_f64; 4];
    let mut types = BTreeSet::new();

    for signal in signals.iter().filter(|s| s.match_id == match_id) {
        let delta = type_weight(signal.signal_type) * strength_multiplier(signal.strength);
        net += delta * signal.side.sign();
        per_side[side_index(signal.side)] += delta;
        types.insert(signal.signal_type);
    }

    if let Some(s) = snapshot {
        let skew = money_skew(s);
        net += skew;
        if skew > 0.0 {
            per_side[side_index(Side::Home)] += skew;
        } else if skew < 0.0 {
            per_side[side_index(Side::Away)] += -skew;
        }
    }

    let sharp_score = round1((BASE_SCORE + net).clamp(0.0, 100.0));
    let confidence =
        (CONFIDENCE_BASE + CONFIDENCE_PER_TYPE * types.len() as u32).min(100);

    SharpScoreResult {
        match_id: match_id.to_string(),
        sharp_score,
        confidence,
        sharp_side: resolve_side(&per_side),
        has_reverse_line_movement: types.contains(&SignalType::ReverseLine),
        signal_types: types.into_iter().collect(),
    }
}

pub fn type_weight(signal_type: SignalType) -> f64 {
    match signal_type {
        SignalType::SteamMove => STEAM_MOVE,
        SignalType::ReverseLine => REVERSE_LINE,
        SignalType::WhaleBet | SignalType::SyndicatePlay => MONEY_FLOW,
        SignalType::LineFreeze => LINE_FREEZE,
    }
}

pub fn strength_multiplier(strength: Strength) -> f64 {
    match strength {
        Strength::Weak => WEAK,
        Strength::Moderate => MODERATE,
        Strength::Strong => STRONG,
    }
}

/// Money share minus bet share on the home side, scaled and capped.
fn money_skew(s: &MarketSnapshot) -> f64 {
    ((s.money_pct_home - s.public_pct_home) * SKEW_FACTOR).clamp(-SKEW_CAP, SKEW_CAP)
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Home => 0,
        Side::Away => 1,
        Side::Over => 2,
        Side::Under => 3,
    }
}

/// Each market nets its two sides against each other; the market with the
/// larger positive net names the sharp side. Equal nets, or nothing, is neutral.
fn resolve_side(per_side: &[f64; 4]) -> SharpSide {
    let lean = |a: Side, b: Side| -> Option<(SharpSide, f64)> {
        let net = per_side[side_index(a)] - per_side[side_index(b)];
        if net > TIE_EPS {
            Some((a.into(), net))
        } else if net < -TIE_EPS {
            Some((b.into(), -net))
        } else {
            None
        }
    };

    match (lean(Side::Home, Side::Away), lean(Side::Over, Side::Under)) {
        (None, None) => SharpSide::Neutral,
        (Some((side, _)), None) | (None, Some((side, _))) => side,
        (Some((spread_side, s)), Some((total_side, t))) => {
            if (s - t).abs() <= TIE_EPS {
                SharpSide::Neutral
            } else if s > t {
                spread_side
            } else {
                total_side
            }
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{secs, snap, with_money};

    fn signal(signal_type: SignalType, side: Side, strength: Strength) -> SharpSignal {
        SharpSignal {
            id: format!("m1:{signal_type}:{side}"),
            match_id: "m1".to_string(),
            signal_type,
            side,
            strength,
            detected_at: secs(0),
            description: String::new(),
        }
    }

    #[test]
    fn no_signals_is_neutral_baseline() {
        let result = score(&[], &snap("m1", secs(0), -3.0, 50.0));
        assert_eq!(result.sharp_score, 50.0);
        assert_eq!(result.confidence, 40);
        assert_eq!(result.sharp_side, SharpSide::Neutral);
        assert!(!result.has_reverse_line_movement);
        assert!(result.signal_types.is_empty());
    }

    #[test]
    fn weighted_deltas_sign_toward_side() {
        let signals = vec![
            signal(SignalType::SteamMove, Side::Home, Strength::Strong),
            signal(SignalType::ReverseLine, Side::Home, Strength::Moderate),
        ];
        let result = score(&signals, &snap("m1", secs(0), -3.0, 50.0));
        // 50 + 15*1.5 + 12*1.0
        assert_eq!(result.sharp_score, 84.5);
        assert_eq!(result.sharp_side, SharpSide::Home);
        assert_eq!(result.confidence, 60);
        assert!(result.has_reverse_line_movement);

        let away = vec![signal(SignalType::LineFreeze, Side::Away, Strength::Weak)];
        let result = score(&away, &snap("m1", secs(0), -3.0, 50.0));
        assert_eq!(result.sharp_score, 46.0);
        assert_eq!(result.sharp_side, SharpSide::Away);
    }

    #[test]
    fn score_is_clamped() {
        let signals = vec![
            signal(SignalType::SteamMove, Side::Away, Strength::Strong),
            signal(SignalType::ReverseLine, Side::Away, Strength::Strong),
            signal(SignalType::SyndicatePlay, Side::Away, Strength::Strong),
            signal(SignalType::LineFreeze, Side::Away, Strength::Strong),
        ];
        let result = score(&signals, &with_money(snap("m1", secs(0), -3.0, 80.0), 20.0));
        assert_eq!(result.sharp_score, 0.0);
        assert_eq!(result.confidence, 80);
    }

    #[test]
    fn opposing_equal_signals_tie_to_neutral() {
        let signals = vec![
            signal(SignalType::SteamMove, Side::Home, Strength::Moderate),
            signal(SignalType::SteamMove, Side::Away, Strength::Moderate),
        ];
        let result = score(&signals, &snap("m1", secs(0), -3.0, 50.0));
        assert_eq!(result.sharp_side, SharpSide::Neutral);
        assert_eq!(result.sharp_score, 50.0);
        // One distinct type, however many signals.
        assert_eq!(result.confidence, 50);
    }

    #[test]
    fn cross_market_tie_is_neutral_and_larger_market_wins() {
        let tie = vec![
            signal(SignalType::SteamMove, Side::Away, Strength::Moderate),
            signal(SignalType::SteamMove, Side::Over, Strength::Moderate),
        ];
        assert_eq!(score_signals("m1", &tie).sharp_side, SharpSide::Neutral);

        let over = vec![
            signal(SignalType::LineFreeze, Side::Away, Strength::Moderate),
            signal(SignalType::SteamMove, Side::Over, Strength::Moderate),
        ];
        assert_eq!(score_signals("m1", &over).sharp_side, SharpSide::Over);
    }

    #[test]
    fn money_skew_nudges_score() {
        let result = score(&[], &with_money(snap("m1", secs(0), -3.0, 40.0), 55.0));
        // (55 - 40) * 0.2 = 3
        assert_eq!(result.sharp_score, 53.0);
        assert_eq!(result.sharp_side, SharpSide::Home);
    }

    #[test]
    fn other_matches_are_ignored() {
        let mut foreign = signal(SignalType::SteamMove, Side::Home, Strength::Strong);
        foreign.match_id = "m2".to_string();
        let result = score(&[foreign], &snap("m1", secs(0), -3.0, 50.0));
        assert_eq!(result.sharp_score, 50.0);
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let signals = vec![
            signal(SignalType::WhaleBet, Side::Home, Strength::Weak),
            signal(SignalType::SteamMove, Side::Under, Strength::Strong),
            signal(SignalType::ReverseLine, Side::Away, Strength::Moderate),
        ];
        let snapshot = with_money(snap("m1", secs(0), -3.0, 62.0), 48.0);
        let first = score(&signals, &snapshot);
        for _ in 0..10 {
            assert_eq!(score(&signals, &snapshot), first);
        }
    }
}
