use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{MonitorConfig, ALERT_CHANNEL_CAPACITY};
use crate::detector::{steam, SteamDetection};
use crate::error::{AppError, Result};
use crate::monitor::SnapshotSource;
use crate::state::LineHistoryStore;
use crate::types::{MarketSnapshot, SteamMove};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub matches: usize,
    pub failed: usize,
    pub created: usize,
    pub updated: usize,
}

enum Merge {
    Created,
    Updated,
    Unchanged,
    Suppressed,
}

// ---------------------------------------------------------------------------
// SteamMonitor
// ---------------------------------------------------------------------------

/// Periodically re-scans every tracked match for steam and keeps a deduplicated
/// alert set. New and updated alerts are also pushed to subscribers.
pub struct SteamMonitor {
    source: Arc<dyn SnapshotSource>,
    cfg: MonitorConfig,
    /// alert id → alert
    alerts: Mutex<HashMap<String, SteamMove>>,
    updates_tx: broadcast::Sender<SteamMove>,
    /// Fetched snapshots are mirrored here so detection and scoring see them.
    sink: Option<Arc<LineHistoryStore>>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl SteamMonitor {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        cfg: MonitorConfig,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        let (updates_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            source,
            cfg,
            alerts: Mutex::new(HashMap::new()),
            updates_tx,
            sink: None,
            health,
            latency,
        }
    }

    pub fn with_sink(mut self, store: Arc<LineHistoryStore>) -> Self {
        self.sink = Some(store);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SteamMove> {
        self.updates_tx.subscribe()
    }

    /// Undismissed alerts, newest first.
    pub fn alerts(&self) -> Vec<SteamMove> {
        let mut visible: Vec<SteamMove> = self
            .alerts
            .lock()
            .values()
            .filter(|a| !a.dismissed)
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.detected_at.cmp(&a.detected_at).then_with(|| a.id.cmp(&b.id)));
        visible
    }

    pub fn dismiss(&self, id: &str) -> Result<SteamMove> {
        let mut alerts = self.alerts.lock();
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| AppError::AlertNotFound(id.to_string()))?;
        if !alert.dismissed {
            alert.dismissed = true;
            info!(alert_id = %id, match_id = %alert.match_id, "[MONITOR] alert dismissed");
        }
        Ok(alert.clone())
    }

    /// Dismiss every visible alert. Returns how many were dismissed.
    pub fn clear_all(&self) -> usize {
        let mut alerts = self.alerts.lock();
        let mut cleared = 0;
        for alert in alerts.values_mut().filter(|a| !a.dismissed) {
            alert.dismissed = true;
            cleared += 1;
        }
        if cleared > 0 {
            info!(cleared, "[MONITOR] alerts cleared");
        }
        cleared
    }

    /// Run one poll cycle: list matches, fetch them concurrently, scan each
    /// fetched history and merge detections into the alert set in completion
    /// order. A match whose fetch fails is skipped and its existing alerts are
    /// left alone.
    pub async fn poll_once(&self) -> PollReport {
        let started = Instant::now();
        let mut report = PollReport::default();

        let match_ids = match self.source.match_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(source = %self.source.name(), "[MONITOR] could not list matches: {e}");
                self.health.inc_poll_failures();
                return report;
            }
        };
        report.matches = match_ids.len();

        // Results are merged as each fetch lands, so a slow match never holds
        // back alerts for the others.
        let mut fetches: FuturesUnordered<_> = match_ids
            .iter()
            .map(|id| async move {
                let result = self.source.fetch(id).await;
                (id, result)
            })
            .collect();

        while let Some((match_id, result)) = fetches.next().await {
            let snapshots = match result {
                Ok(s) => s,
                Err(e) => {
                    warn!(match_id = %match_id, "[MONITOR] fetch failed: {e}");
                    report.failed += 1;
                    continue;
                }
            };
            self.mirror(&snapshots);
            for detection in self.scan_tail(&snapshots) {
                match self.merge(match_id, detection) {
                    Merge::Created => report.created += 1,
                    Merge::Updated => report.updated += 1,
                    Merge::Unchanged | Merge::Suppressed => {}
                }
            }
        }

        self.latency.record(started.elapsed());
        self.health.add_fetch_failures(report.failed as u64);
        self.health.record_poll(Utc::now().timestamp_millis());
        debug!(
            matches = report.matches,
            failed = report.failed,
            created = report.created,
            updated = report.updated,
            "[MONITOR] poll complete"
        );
        report
    }

    /// Steam scan over the trailing window of each sportsbook's series.
    fn scan_tail(&self, snapshots: &[MarketSnapshot]) -> Vec<SteamDetection> {
        let window = Duration::seconds(self.cfg.detector.steam_window_secs);
        let mut by_book: BTreeMap<&str, Vec<MarketSnapshot>> = BTreeMap::new();
        for s in snapshots {
            by_book.entry(s.sportsbook.as_str()).or_default().push(s.clone());
        }

        let mut detections = Vec::new();
        for (_, mut series) in by_book {
            series.sort_by_key(|s| s.timestamp);
            let Some(latest) = series.last().map(|s| s.timestamp) else {
                continue;
            };
            let cutoff = latest - window;
            series.retain(|s| s.timestamp >= cutoff);
            detections.extend(steam::scan(&series, &self.cfg.detector));
        }
        detections
    }

    fn mirror(&self, snapshots: &[MarketSnapshot]) {
        let Some(store) = &self.sink else {
            return;
        };
        for s in snapshots {
            let newer = store
                .last_timestamp(&s.match_id, &s.sportsbook)
                .map_or(true, |last| s.timestamp > last);
            if newer {
                if let Err(e) = store.append(s.clone()) {
                    debug!(match_id = %s.match_id, "[MONITOR] snapshot not mirrored: {e}");
                }
            }
        }
    }

    /// Alerts are unique per (match, market, side) while their window is live.
    fn merge(&self, match_id: &str, d: SteamDetection) -> Merge {
        let window = Duration::seconds(self.cfg.detector.steam_window_secs);
        let mut alerts = self.alerts.lock();

        let same_key = |a: &SteamMove| {
            a.match_id == match_id && a.market_type == d.market_type && a.side == d.side
        };

        // Already seen and dismissed by the user: do not raise it again.
        if alerts
            .values()
            .any(|a| a.dismissed && same_key(a) && d.detected_at <= a.detected_at)
        {
            return Merge::Suppressed;
        }

        let live = alerts
            .values_mut()
            .filter(|a| !a.dismissed && same_key(&**a) && d.detected_at <= a.detected_at + window)
            .max_by_key(|a| a.detected_at);

        if let Some(alert) = live {
            let grew = d.movement > alert.movement;
            if d.detected_at <= alert.detected_at && !grew {
                return Merge::Unchanged;
            }
            // The alert keeps the largest move seen; a later but smaller
            // sighting only refreshes its timestamp.
            if grew {
                alert.sportsbook = d.sportsbook;
                alert.movement = d.movement;
                alert.from_value = d.from_value;
                alert.to_value = d.to_value;
                alert.strength = d.strength;
                alert.window_started_at = d.started_at;
            }
            alert.detected_at = alert.detected_at.max(d.detected_at);
            let updated = alert.clone();
            drop(alerts);

            info!(
                alert_id = %updated.id,
                match_id = %updated.match_id,
                movement = updated.movement,
                strength = %updated.strength,
                "[MONITOR] steam alert updated"
            );
            let _ = self.updates_tx.send(updated);
            return Merge::Updated;
        }

        let alert = SteamMove {
            id: Uuid::new_v4().to_string(),
            match_id: match_id.to_string(),
            sportsbook: d.sportsbook,
            market_type: d.market_type,
            side: d.side,
            movement: d.movement,
            from_value: d.from_value,
            to_value: d.to_value,
            strength: d.strength,
            window_started_at: d.started_at,
            detected_at: d.detected_at,
            dismissed: false,
        };
        alerts.insert(alert.id.clone(), alert.clone());
        drop(alerts);

        info!(
            alert_id = %alert.id,
            match_id = %alert.match_id,
            market = %alert.market_type,
            side = %alert.side,
            movement = alert.movement,
            strength = %alert.strength,
            "[MONITOR] steam alert raised"
        );
        let _ = self.updates_tx.send(alert);
        Merge::Created
    }

    /// Poll on a fixed interval until `stop_rx` flips to true. Polls never
    /// overlap; ticks missed during a slow poll are skipped.
    pub async fn run(&self, mut stop_rx: watch::Receiver<bool>) {
        self.health.set_monitor_running(true);
        info!(
            interval_ms = self.cfg.poll_interval.as_millis() as u64,
            source = %self.source.name(),
            "[MONITOR] started"
        );

        let mut ticker = tokio::time::interval(self.cfg.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *stop_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.health.set_monitor_running(false);
        info!("[MONITOR] stopped");
    }

    pub fn spawn(self: &Arc<Self>) -> MonitorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let join = tokio::spawn(async move { monitor.run(stop_rx).await });
        MonitorHandle { stop_tx, join }
    }
}

/// Owner handle for a spawned monitor.
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal stop and wait for the loop to exit. An in-flight poll finishes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            warn!("[MONITOR] task ended abnormally: {e}");
        }
    }
}
