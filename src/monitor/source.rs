use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::FEED_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::state::LineHistoryStore;
use crate::types::MarketSnapshot;

/// Where the monitor reads line history from. Implementations only fetch;
/// retry policy belongs to the monitor's poll loop.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn name(&self) -> &str;

    /// Matches currently worth polling.
    async fn match_ids(&self) -> Result<Vec<String>>;

    /// Ordered history for one match (any number of sportsbooks).
    async fn fetch(&self, match_id: &str) -> Result<Vec<MarketSnapshot>>;
}

// ---------------------------------------------------------------------------
// StoreSource
// ---------------------------------------------------------------------------

/// Reads straight from the in-process line history store.
pub struct StoreSource {
    store: Arc<LineHistoryStore>,
}

impl StoreSource {
    pub fn new(store: Arc<LineHistoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotSource for StoreSource {
    fn name(&self) -> &str {
        "store"
    }

    async fn match_ids(&self) -> Result<Vec<String>> {
        Ok(self.store.match_ids())
    }

    async fn fetch(&self, match_id: &str) -> Result<Vec<MarketSnapshot>> {
        Ok(self.store.history(match_id))
    }
}

// ---------------------------------------------------------------------------
// HttpSnapshotSource
// ---------------------------------------------------------------------------

/// JSON feed exposing `GET {base}/matches` (array of ids) and
/// `GET {base}/matches/{id}/snapshots` (array of snapshots).
pub struct HttpSnapshotSource {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpSnapshotSource {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_ids(&self) -> Result<Vec<String>> {
        let url = format!("{}/matches", self.base_url);
        let ids: Vec<String> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ids)
    }

    async fn fetch(&self, match_id: &str) -> Result<Vec<MarketSnapshot>> {
        let url = format!("{}/matches/{}/snapshots", self.base_url, match_id);
        let mut snapshots: Vec<MarketSnapshot> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        snapshots.retain(|s| s.match_id == match_id);
        debug!(
            source = %self.name,
            match_id = %match_id,
            count = snapshots.len(),
            "[SOURCE] fetched snapshots"
        );
        Ok(snapshots)
    }
}

// ---------------------------------------------------------------------------
// PrioritySource
// ---------------------------------------------------------------------------

/// Explicit provider precedence: sources are asked in order and the first one
/// that returns data for a match wins. A failing source falls through to the
/// next; the fetch only fails when every source failed.
pub struct PrioritySource {
    sources: Vec<Arc<dyn SnapshotSource>>,
}

impl PrioritySource {
    pub fn new(sources: Vec<Arc<dyn SnapshotSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SnapshotSource for PrioritySource {
    fn name(&self) -> &str {
        "priority"
    }

    async fn match_ids(&self) -> Result<Vec<String>> {
        let mut ids = BTreeSet::new();
        let mut errors = Vec::new();
        for source in &self.sources {
            match source.match_ids().await {
                Ok(found) => ids.extend(found),
                Err(e) => {
                    warn!(source = %source.name(), "[SOURCE] match list failed: {e}");
                    errors.push(format!("{}: {e}", source.name()));
                }
            }
        }
        if !self.sources.is_empty() && errors.len() == self.sources.len() {
            return Err(AppError::Source(errors.join("; ")));
        }
        Ok(ids.into_iter().collect())
    }

    async fn fetch(&self, match_id: &str) -> Result<Vec<MarketSnapshot>> {
        let mut errors = Vec::new();
        for source in &self.sources {
            match source.fetch(match_id).await {
                Ok(snapshots) if !snapshots.is_empty() => return Ok(snapshots),
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        source = %source.name(),
                        match_id = %match_id,
                        "[SOURCE] fetch failed, trying next source: {e}"
                    );
                    errors.push(format!("{}: {e}", source.name()));
                }
            }
        }
        if !self.sources.is_empty() && errors.len() == self.sources.len() {
            return Err(AppError::Source(errors.join("; ")));
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_support::{secs, snap};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source whose matches can be made to fail or stall on demand.
    pub(crate) struct FakeSource {
        pub name: String,
        pub data: Mutex<HashMap<String, Vec<MarketSnapshot>>>,
        pub failing: Mutex<BTreeSet<String>>,
        pub list_fails: Mutex<bool>,
        pub delays: Mutex<HashMap<String, Duration>>,
        pub fetches_started: AtomicUsize,
        pub fetches_finished: AtomicUsize,
        in_flight: AtomicUsize,
        pub peak_in_flight: AtomicUsize,
    }

    impl FakeSource {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                data: Mutex::new(HashMap::new()),
                failing: Mutex::new(BTreeSet::new()),
                list_fails: Mutex::new(false),
                delays: Mutex::new(HashMap::new()),
                fetches_started: AtomicUsize::new(0),
                fetches_finished: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            })
        }

        /// Make every fetch of `match_id` take at least `delay`.
        pub fn stall(&self, match_id: &str, delay: Duration) {
            self.delays.lock().insert(match_id.to_string(), delay);
        }

        pub fn set(&self, match_id: &str, snapshots: Vec<MarketSnapshot>) {
            self.data.lock().insert(match_id.to_string(), snapshots);
        }

        pub fn fail(&self, match_id: &str, failing: bool) {
            let mut set = self.failing.lock();
            if failing {
                set.insert(match_id.to_string());
            } else {
                set.remove(match_id);
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn match_ids(&self) -> Result<Vec<String>> {
            if *self.list_fails.lock() {
                return Err(AppError::Source("list unavailable".to_string()));
            }
            let mut ids: Vec<String> = self.data.lock().keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }

        async fn fetch(&self, match_id: &str) -> Result<Vec<MarketSnapshot>> {
            self.fetches_started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.lock().get(match_id).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.fetches_finished.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().contains(match_id) {
                return Err(AppError::Source(format!("{match_id} unavailable")));
            }
            Ok(self.data.lock().get(match_id).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn store_source_reads_history() {
        let store = LineHistoryStore::new();
        store.append(snap("m1", secs(0), -3.0, 50.0)).unwrap();
        let source = StoreSource::new(store);
        assert_eq!(source.match_ids().await.unwrap(), vec!["m1".to_string()]);
        assert_eq!(source.fetch("m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn priority_source_prefers_first_and_falls_through() {
        let primary = FakeSource::new("primary");
        let backup = FakeSource::new("backup");
        primary.set("m1", vec![snap("m1", secs(0), -3.0, 50.0)]);
        backup.set("m1", vec![snap("m1", secs(0), -4.0, 50.0)]);
        backup.set("m2", vec![snap("m2", secs(0), 1.0, 50.0)]);

        let sources: Vec<Arc<dyn SnapshotSource>> = vec![primary.clone(), backup.clone()];
        let merged = PrioritySource::new(sources);
        assert_eq!(merged.fetch("m1").await.unwrap()[0].spread_home, -3.0);
        assert_eq!(merged.fetch("m2").await.unwrap()[0].spread_home, 1.0);
        assert_eq!(merged.match_ids().await.unwrap().len(), 2);

        primary.fail("m1", true);
        assert_eq!(merged.fetch("m1").await.unwrap()[0].spread_home, -4.0);

        backup.fail("m1", true);
        assert!(merged.fetch("m1").await.is_err());
    }
}
