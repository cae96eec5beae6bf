use crate::config::DetectorConfig;
use crate::detector::{classifier, RuleHit};
use crate::types::{MarketSnapshot, MarketType, Side, SignalType};

/// Reverse line movement: the spread travels toward the side the public is
/// *not* backing. Public majority is read from the latest snapshot; line
/// movement is measured across the whole series.
pub fn detect(series: &[MarketSnapshot], cfg: &DetectorConfig) -> Option<RuleHit> {
    let (first, last) = (series.first()?, series.last()?);
    if series.len() < 2 {
        return None;
    }

    let movement = last.spread_home - first.spread_home;
    if movement.abs() <= cfg.rlm_min_move {
        return None;
    }
    let line_side = MarketType::Spread.side_for_move(movement);

    let public_side = if last.public_pct_home > cfg.rlm_public_pct {
        Side::Home
    } else if last.public_pct_away > cfg.rlm_public_pct {
        Side::Away
    } else {
        return None;
    };

    // Public and line agree: ordinary market behaviour.
    if public_side == line_side {
        return None;
    }

    let public_pct = last.public_pct(public_side);
    Some(RuleHit {
        signal_type: SignalType::ReverseLine,
        side: line_side,
        strength: classifier::reverse_line_strength(public_pct, movement),
        detected_at: last.timestamp,
        description: format!(
            "{public_pct:.0}% of bets on {public_side} but the spread moved {:.1} pts toward {line_side} ({} → {})",
            movement.abs(),
            first.spread_home,
            last.spread_home,
        ),
    })
}
