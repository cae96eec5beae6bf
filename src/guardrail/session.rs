use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;

/// Tracks the start of the current betting session. Only the start is stored;
/// elapsed time is always derived from the clock.
#[derive(Debug, Default)]
pub struct SessionTimer {
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl SessionTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start a session at `now`, or return the running session's start.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut started = self.started_at.lock();
        match *started {
            Some(at) => at,
            None => {
                info!(at = %now, "[SESSION] started");
                *started = Some(now);
                now
            }
        }
    }

    /// End the session, returning how long it ran in minutes.
    pub fn end(&self, now: DateTime<Utc>) -> Option<f64> {
        let started = self.started_at.lock().take()?;
        let minutes = minutes_between(started, now);
        info!(minutes, "[SESSION] ended");
        Some(minutes)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock()
    }

    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> Option<f64> {
        self.started_at().map(|at| minutes_between(at, now))
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds().max(0) as f64) / 60.0
}
