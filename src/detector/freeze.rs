use crate::config::DetectorConfig;
use crate::detector::{classifier, RuleHit};
use crate::types::{MarketSnapshot, Side, SignalType};

/// Line freeze: the public has been piling onto one side for a sustained
/// stretch yet the book refuses to move the spread. The signal goes to the
/// side the book is protecting, the one the public is *not* on.
pub fn detect(series: &[MarketSnapshot], cfg: &DetectorConfig) -> Option<RuleHit> {
    let last = series.last()?;
    let public_side = lopsided_side(last, cfg.freeze_public_pct)?;

    // Trailing run of snapshots where the same side stayed lopsided.
    let run_start = series
        .iter()
        .rposition(|s| lopsided_side(s, cfg.freeze_public_pct) != Some(public_side))
        .map_or(0, |idx| idx + 1);
    let run = &series[run_start..];
    if run.len() < 2 {
        return None;
    }

    let held_secs = (last.timestamp - run[0].timestamp).num_seconds();
    if held_secs < cfg.freeze_min_secs {
        return None;
    }

    let anchor = run[0].spread_home;
    let drift = run
        .iter()
        .map(|s| (s.spread_home - anchor).abs())
        .fold(0.0_f64, f64::max);
    if drift > cfg.freeze_tolerance {
        return None;
    }

    let public_pct = last.public_pct(public_side);
    let side = public_side.opposite();
    Some(RuleHit {
        signal_type: SignalType::LineFreeze,
        side,
        strength: classifier::freeze_strength(public_pct),
        detected_at: last.timestamp,
        description: format!(
            "{public_pct:.0}% of bets on {public_side} for {} min but the spread held at {anchor} (±{drift:.2})",
            held_secs / 60,
        ),
    })
}

fn lopsided_side(s: &MarketSnapshot, threshold: f64) -> Option<Side> {
    if s.public_pct_home > threshold {
        Some(Side::Home)
    } else if s.public_pct_away > threshold {
        Some(Side::Away)
    } else {
        None
    }
}
