use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::MarketSnapshot;

// ---------------------------------------------------------------------------
// LineHistoryStore
// ---------------------------------------------------------------------------

/// Append-only line history. Each (match, sportsbook) series is kept in strict
/// timestamp order; anything that would break that order is rejected, never
/// reordered.
pub struct LineHistoryStore {
    /// match_id → sportsbook → snapshots ordered by timestamp
    histories: DashMap<String, BTreeMap<String, Vec<MarketSnapshot>>>,
    /// Serializes writers so a batch is checked and committed as one step.
    writer: Mutex<()>,
}

impl LineHistoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one snapshot. Fails if it is malformed or not strictly newer than
    /// the last snapshot for the same match and sportsbook.
    pub fn append(&self, snapshot: MarketSnapshot) -> Result<()> {
        let _writer = self.writer.lock();
        self.append_locked(snapshot)
    }

    fn append_locked(&self, snapshot: MarketSnapshot) -> Result<()> {
        validate(&snapshot)?;
        let mut books = self.histories.entry(snapshot.match_id.clone()).or_default();
        let series = books.entry(snapshot.sportsbook.clone()).or_default();
        if let Some(last) = series.last() {
            check_order(&snapshot, last.timestamp)?;
        }
        debug!(
            match_id = %snapshot.match_id,
            sportsbook = %snapshot.sportsbook,
            spread_home = snapshot.spread_home,
            total = snapshot.total,
            "[STORE] snapshot recorded"
        );
        series.push(snapshot);
        Ok(())
    }

    /// Record a batch atomically with respect to other writers: either every
    /// snapshot is accepted or none is. Readers may observe a batch while it is
    /// being committed. Returns the number of snapshots recorded.
    pub fn append_batch(&self, snapshots: Vec<MarketSnapshot>) -> Result<usize> {
        let _writer = self.writer.lock();
        // Validate against the current tails plus the batch's own ordering first.
        let mut tails: HashMap<(String, String), DateTime<Utc>> = HashMap::new();
        for snapshot in &snapshots {
            validate(snapshot)?;
            let key = (snapshot.match_id.clone(), snapshot.sportsbook.clone());
            let previous = match tails.get(&key) {
                Some(ts) => Some(*ts),
                None => self.last_timestamp(&snapshot.match_id, &snapshot.sportsbook),
            };
            if let Some(previous) = previous {
                check_order(snapshot, previous)?;
            }
            tails.insert(key, snapshot.timestamp);
        }

        let count = snapshots.len();
        for snapshot in snapshots {
            self.append_locked(snapshot)?;
        }
        Ok(count)
    }

    pub fn last_timestamp(&self, match_id: &str, sportsbook: &str) -> Option<DateTime<Utc>> {
        let books = self.histories.get(match_id)?;
        books.get(sportsbook)?.last().map(|s| s.timestamp)
    }

    /// Full history for a match across sportsbooks, ordered by timestamp.
    pub fn history(&self, match_id: &str) -> Vec<MarketSnapshot> {
        let Some(books) = self.histories.get(match_id) else {
            return Vec::new();
        };
        let mut all: Vec<MarketSnapshot> = books.values().flatten().cloned().collect();
        drop(books);
        all.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.sportsbook.cmp(&b.sportsbook))
        });
        all
    }

    pub fn book_history(&self, match_id: &str, sportsbook: &str) -> Vec<MarketSnapshot> {
        self.histories
            .get(match_id)
            .and_then(|books| books.get(sportsbook).cloned())
            .unwrap_or_default()
    }

    /// Snapshots at or after `since`, across sportsbooks.
    pub fn tail(&self, match_id: &str, since: DateTime<Utc>) -> Vec<MarketSnapshot> {
        self.history(match_id)
            .into_iter()
            .filter(|s| s.timestamp >= since)
            .collect()
    }

    /// Most recent snapshot for a match across all sportsbooks.
    pub fn latest(&self, match_id: &str) -> Option<MarketSnapshot> {
        let books = self.histories.get(match_id)?;
        books
            .values()
            .filter_map(|series| series.last())
            .max_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| b.sportsbook.cmp(&a.sportsbook))
            })
            .cloned()
    }

    pub fn match_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.histories.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn match_count(&self) -> usize {
        self.histories.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.histories
            .iter()
            .map(|e| e.value().values().map(Vec::len).sum::<usize>())
            .sum()
    }
}

impl Default for LineHistoryStore {
    fn default() -> Self {
        Self {
            histories: DashMap::new(),
            writer: Mutex::new(()),
        }
    }
}

fn check_order(snapshot: &MarketSnapshot, previous: DateTime<Utc>) -> Result<()> {
    if snapshot.timestamp <= previous {
        return Err(AppError::OutOfOrder {
            match_id: snapshot.match_id.clone(),
            sportsbook: snapshot.sportsbook.clone(),
            timestamp: snapshot.timestamp.to_rfc3339(),
            previous: previous.to_rfc3339(),
        });
    }
    Ok(())
}

fn validate(s: &MarketSnapshot) -> Result<()> {
    let invalid = |reason: &str| AppError::InvalidSnapshot {
        match_id: s.match_id.clone(),
        reason: reason.to_string(),
    };

    if s.match_id.trim().is_empty() {
        return Err(invalid("match_id is empty"));
    }
    if s.sportsbook.trim().is_empty() {
        return Err(invalid("sportsbook is empty"));
    }
    let lines = [
        s.spread_home,
        s.spread_away,
        s.total,
        s.moneyline_home,
        s.moneyline_away,
    ];
    if lines.iter().any(|v| !v.is_finite()) {
        return Err(invalid("line values must be finite"));
    }
    let pcts = [
        s.public_pct_home,
        s.public_pct_away,
        s.money_pct_home,
        s.money_pct_away,
    ];
    if pcts.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 100.0) {
        return Err(invalid("percentages must be within 0-100"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
