use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{MarketType, SharpSignal, SignalType};

/// Live signal list per match. A newer signal of the same type on the same
/// market replaces the older one; signals themselves are never edited.
/// `record` expects the full output of one detection pass over the history.
pub struct SignalBook {
    signals: DashMap<String, Vec<SharpSignal>>,
}

impl SignalBook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fold a fresh detection pass into the match's list and return the
    /// resulting active set. A newer signal replaces the one in its
    /// (type, market) slot; a slot the fresh pass no longer reports is
    /// retired, since the history stopped supporting it.
    pub fn record(&self, match_id: &str, fresh: Vec<SharpSignal>) -> Vec<SharpSignal> {
        let mut entry = self.signals.entry(match_id.to_string()).or_default();
        let mut next: Vec<SharpSignal> = Vec::with_capacity(fresh.len());
        for signal in fresh {
            let key = slot(&signal);
            match next.iter().position(|s| slot(s) == key) {
                Some(idx) if next[idx].detected_at <= signal.detected_at => next[idx] = signal,
                Some(_) => {}
                None => next.push(signal),
            }
        }
        // An older re-detection never overwrites a newer signal in a live slot.
        for current in next.iter_mut() {
            let key = slot(current);
            if let Some(kept) = entry
                .iter()
                .find(|s| slot(s) == key && s.detected_at > current.detected_at)
            {
                *current = kept.clone();
            }
        }
        next.sort_by(|a, b| {
            a.detected_at
                .cmp(&b.detected_at)
                .then_with(|| a.signal_type.cmp(&b.signal_type))
        });
        *entry = next;
        entry.clone()
    }

    pub fn active(&self, match_id: &str) -> Vec<SharpSignal> {
        self.signals
            .get(match_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, match_id: &str) {
        self.signals.remove(match_id);
    }
}

impl Default for SignalBook {
    fn default() -> Self {
        Self {
            signals: DashMap::new(),
        }
    }
}

/// Steam and whale activity is tracked separately per market; the
/// money-flow escalation (whale → syndicate) shares one slot.
fn slot(signal: &SharpSignal) -> (SignalType, MarketType) {
    let kind = match signal.signal_type {
        SignalType::SyndicatePlay => SignalType::WhaleBet,
        other => other,
    };
    (kind, signal.side.market())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::detector::detect;
    use crate::scorer;
    use crate::test_support::{secs, snap};
    use crate::types::{SharpSide, Side, Strength};

    fn signal(signal_type: SignalType, side: Side, at: i64) -> SharpSignal {
        SharpSignal {
            id: format!("{signal_type}-{side}-{at}"),
            match_id: "m1".to_string(),
            signal_type,
            side,
            strength: Strength::Moderate,
            detected_at: secs(at),
            description: String::new(),
        }
    }

    #[test]
    fn newer_signal_supersedes_same_type() {
        let book = SignalBook::new();
        book.record("m1", vec![signal(SignalType::SteamMove, Side::Home, 10)]);
        let active = book.record("m1", vec![signal(SignalType::SteamMove, Side::Away, 20)]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].side, Side::Away);

        // An older detection never overwrites a newer one.
        let active = book.record("m1", vec![signal(SignalType::SteamMove, Side::Home, 5)]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].side, Side::Away);
    }

    #[test]
    fn distinct_types_and_markets_coexist() {
        let book = SignalBook::new();
        let active = book.record(
            "m1",
            vec![
                signal(SignalType::SteamMove, Side::Home, 10),
                signal(SignalType::SteamMove, Side::Over, 10),
                signal(SignalType::ReverseLine, Side::Home, 10),
            ],
        );
        assert_eq!(active.len(), 3);

        book.clear("m1");
        assert!(book.active("m1").is_empty());
    }

    #[test]
    fn syndicate_and_whale_share_a_slot() {
        let book = SignalBook::new();
        let active = book.record(
            "m1",
            vec![
                signal(SignalType::WhaleBet, Side::Away, 30),
                signal(SignalType::SyndicatePlay, Side::Away, 40),
            ],
        );
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].signal_type, SignalType::SyndicatePlay);
    }

    #[test]
    fn slots_missing_from_a_fresh_pass_are_retired() {
        let book = SignalBook::new();
        book.record(
            "m1",
            vec![
                signal(SignalType::LineFreeze, Side::Away, 10),
                signal(SignalType::SteamMove, Side::Home, 10),
            ],
        );
        let active = book.record("m1", vec![signal(SignalType::SteamMove, Side::Home, 10)]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].signal_type, SignalType::SteamMove);

        assert!(book.record("m1", Vec::new()).is_empty());
        assert!(book.active("m1").is_empty());
    }

    #[test]
    fn resolved_freeze_stops_moving_the_score() {
        let cfg = DetectorConfig::default();
        let book = SignalBook::new();
        let mut history = vec![
            snap("m1", secs(0), -6.5, 82.0),
            snap("m1", secs(900), -6.5, 82.0),
            snap("m1", secs(1800), -6.5, 82.0),
        ];
        let active = book.record("m1", detect(&history, &cfg));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].signal_type, SignalType::LineFreeze);
        assert_eq!(active[0].side, Side::Away);

        // The book finally moves, in slow steps that are not steam.
        history.push(snap("m1", secs(2400), -8.0, 82.0));
        history.push(snap("m1", secs(3000), -9.5, 82.0));
        assert!(detect(&history, &cfg).is_empty());

        let active = book.record("m1", detect(&history, &cfg));
        assert!(active.is_empty());
        let latest = history.last().unwrap();
        let result = scorer::score(&active, latest);
        assert_eq!(result.sharp_score, 50.0);
        assert_eq!(result.sharp_side, SharpSide::Neutral);
    }
}
