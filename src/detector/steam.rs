use chrono::{DateTime, Utc};

use crate::config::DetectorConfig;
use crate::detector::classifier;
use crate::types::{MarketSnapshot, MarketType, Side, Strength};

/// Steps smaller than this are treated as "no move" when checking direction.
const FLAT_EPS: f64 = 1e-9;

/// A consistent one-directional run inside the steam window.
#[derive(Debug, Clone, PartialEq)]
pub struct SteamDetection {
    pub market_type: MarketType,
    pub side: Side,
    /// Absolute movement in points.
    pub movement: f64,
    pub from_value: f64,
    pub to_value: f64,
    pub strength: Strength,
    pub started_at: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub sportsbook: String,
}

/// Scan one sportsbook's ordered series for steam on the spread and the total.
///
/// For every end point the run is extended backwards while it stays inside the
/// window and never reverses direction (flat steps are allowed). A run must
/// move strictly more than the threshold. The largest qualifying run per market
/// is reported; equal runs resolve to the most recent.
pub fn scan(series: &[MarketSnapshot], cfg: &DetectorConfig) -> Vec<SteamDetection> {
    if series.len() < 2 {
        return Vec::new();
    }
    [MarketType::Spread, MarketType::Total]
        .into_iter()
        .filter_map(|market| best_run(series, market, cfg))
        .collect()
}

fn best_run(
    series: &[MarketSnapshot],
    market: MarketType,
    cfg: &DetectorConfig,
) -> Option<SteamDetection> {
    // (start, end, signed movement)
    let mut best: Option<(usize, usize, f64)> = None;

    for end in 1..series.len() {
        let end_ts = series[end].timestamp;
        let end_value = series[end].line(market);
        let mut direction = 0.0_f64;

        for start in (0..end).rev() {
            if (end_ts - series[start].timestamp).num_seconds() > cfg.steam_window_secs {
                break;
            }
            let step = series[start + 1].line(market) - series[start].line(market);
            if step.abs() > FLAT_EPS {
                let step_dir = step.signum();
                if direction == 0.0 {
                    direction = step_dir;
                } else if step_dir != direction {
                    break;
                }
            }

            let movement = end_value - series[start].line(market);
            if movement.abs() <= cfg.steam_threshold + FLAT_EPS {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, _, m)) => movement.abs() >= m.abs() - FLAT_EPS,
            };
            if better {
                best = Some((start, end, movement));
            }
        }
    }

    let (start, end, movement) = best?;
    Some(SteamDetection {
        market_type: market,
        side: market.side_for_move(movement),
        movement: movement.abs(),
        from_value: series[start].line(market),
        to_value: series[end].line(market),
        strength: classifier::steam_strength(movement, cfg.strength_unit),
        started_at: series[start].timestamp,
        detected_at: series[end].timestamp,
        sportsbook: series[end].sportsbook.clone(),
    })
}
