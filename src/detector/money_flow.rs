use crate::config::DetectorConfig;
use crate::detector::{classifier, RuleHit};
use crate::types::{MarketSnapshot, Side, SignalType};

/// Whale bet / syndicate play: a side takes a far larger share of the money
/// than of the bet count, meaning a few large tickets. One snapshot with the
/// gap is a whale; the gap holding across several consecutive trailing
/// snapshots escalates to a syndicate.
pub fn detect(series: &[MarketSnapshot], cfg: &DetectorConfig) -> Option<RuleHit> {
    let last = series.last()?;
    let (side, gap) = money_gap(last);
    if gap < cfg.whale_gap {
        return None;
    }

    let mut run = 0usize;
    let mut min_gap = gap;
    for s in series.iter().rev() {
        let (s_side, s_gap) = money_gap(s);
        if s_side != side || s_gap < cfg.whale_gap {
            break;
        }
        run += 1;
        min_gap = min_gap.min(s_gap);
    }

    let min_run = cfg.syndicate_min_snapshots.max(2);
    let (signal_type, graded_gap) = if run >= min_run {
        (SignalType::SyndicatePlay, min_gap)
    } else {
        (SignalType::WhaleBet, gap)
    };

    let public_pct = last.public_pct(side);
    let money_pct = last.money_pct(side);
    let description = match signal_type {
        SignalType::SyndicatePlay => format!(
            "money outweighs tickets on {side} by at least {min_gap:.0} pts across {run} consecutive snapshots"
        ),
        _ => format!("{money_pct:.0}% of money on {side} from {public_pct:.0}% of bets"),
    };

    Some(RuleHit {
        signal_type,
        side,
        strength: classifier::money_flow_strength(graded_gap),
        detected_at: last.timestamp,
        description,
    })
}

/// Side with the larger money-minus-public gap, and that gap in points.
fn money_gap(s: &MarketSnapshot) -> (Side, f64) {
    let home = s.money_pct_home - s.public_pct_home;
    let away = s.money_pct_away - s.public_pct_away;
    if home >= away {
        (Side::Home, home)
    } else {
        (Side::Away, away)
    }
}
