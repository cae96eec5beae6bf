use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{DetectorConfig, MIN_HISTORY_LEN};
use crate::detector::{freeze, money_flow, reverse_line, steam, RuleHit};
use crate::types::{MarketSnapshot, SharpSignal, Side, SignalType, Strength};

/// Runs every detection rule over a match's line history.
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    cfg: DetectorConfig,
}

impl SignalDetector {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    pub fn detect(&self, history: &[MarketSnapshot]) -> Vec<SharpSignal> {
        detect(history, &self.cfg)
    }
}

/// Evaluate one match's history and return every signal it currently shows.
///
/// Each sportsbook's series is evaluated on its own; when several books show
/// the same (type, side) only the strongest, most recent one is kept. Output is
/// ordered by detection time, then type, then side, and carries no wall-clock
/// input, so the same history always yields the same signals.
pub fn detect(history: &[MarketSnapshot], cfg: &DetectorConfig) -> Vec<SharpSignal> {
    if history.len() < MIN_HISTORY_LEN {
        return Vec::new();
    }
    let Some(match_id) = history.first().map(|s| s.match_id.clone()) else {
        return Vec::new();
    };

    let mut by_book: BTreeMap<&str, Vec<&MarketSnapshot>> = BTreeMap::new();
    for snapshot in history.iter().filter(|s| s.match_id == match_id) {
        by_book.entry(snapshot.sportsbook.as_str()).or_default().push(snapshot);
    }

    let mut best: BTreeMap<(SignalType, Side), (RuleHit, String)> = BTreeMap::new();
    for (book, refs) in by_book {
        if refs.len() < MIN_HISTORY_LEN {
            continue;
        }
        let mut series: Vec<MarketSnapshot> = refs.into_iter().cloned().collect();
        series.sort_by_key(|s| s.timestamp);

        for hit in evaluate_series(&series, cfg) {
            let key = (hit.signal_type, hit.side);
            let replace = match best.get(&key) {
                None => true,
                Some((current, _)) => outranks(&hit, current),
            };
            if replace {
                best.insert(key, (hit, book.to_string()));
            }
        }
    }

    let mut signals: Vec<SharpSignal> = best
        .into_values()
        .map(|(hit, book)| stamp(&match_id, hit, &book))
        .collect();
    signals.sort_by(|a, b| {
        a.detected_at
            .cmp(&b.detected_at)
            .then_with(|| a.signal_type.cmp(&b.signal_type))
            .then_with(|| a.side.cmp(&b.side))
    });

    if !signals.is_empty() {
        debug!(
            match_id = %match_id,
            count = signals.len(),
            "[DETECTOR] {} signal(s) for {match_id}",
            signals.len(),
        );
    }
    signals
}

fn evaluate_series(series: &[MarketSnapshot], cfg: &DetectorConfig) -> Vec<RuleHit> {
    let mut hits: Vec<RuleHit> = steam::scan(series, cfg)
        .into_iter()
        .map(|d| RuleHit {
            signal_type: SignalType::SteamMove,
            side: d.side,
            strength: d.strength,
            detected_at: d.detected_at,
            description: format!(
                "{} moved {:.1} pts toward {} in {}s ({} → {})",
                d.market_type,
                d.movement,
                d.side,
                (d.detected_at - d.started_at).num_seconds(),
                d.from_value,
                d.to_value,
            ),
        })
        .collect();

    hits.extend(reverse_line::detect(series, cfg));
    hits.extend(freeze::detect(series, cfg));
    hits.extend(money_flow::detect(series, cfg));
    hits
}

fn outranks(candidate: &RuleHit, current: &RuleHit) -> bool {
    let rank = |h: &RuleHit| (h.strength, h.detected_at);
    rank(candidate) > rank(current)
}

fn stamp(match_id: &str, hit: RuleHit, book: &str) -> SharpSignal {
    SharpSignal {
        id: format!(
            "{match_id}:{}:{}:{}",
            hit.signal_type,
            hit.side,
            hit.detected_at.timestamp_millis()
        ),
        match_id: match_id.to_string(),
        signal_type: hit.signal_type,
        side: hit.side,
        strength: hit.strength,
        detected_at: hit.detected_at,
        description: format!("[{book}] {}", hit.description),
    }
}

/// Strongest strength among signals of `signal_type`, if any.
pub fn strongest(signals: &[SharpSignal], signal_type: SignalType) -> Option<Strength> {
    signals
        .iter()
        .filter(|s| s.signal_type == signal_type)
        .map(|s| s.strength)
        .max()
}
