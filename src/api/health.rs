//! Shared health state for the /health endpoint.
//! Written by the steam monitor, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    /// True while the monitor's poll loop is alive.
    pub monitor_running: AtomicBool,
    /// Millisecond timestamp of the last completed poll (0 = none).
    pub last_poll_at_ms: AtomicI64,
    pub polls_completed: AtomicU64,
    /// Per-match fetches that failed, across all polls.
    pub fetch_failures: AtomicU64,
    /// Polls that could not even list matches.
    pub poll_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub monitor_running: bool,
    pub last_poll_at_ms: Option<i64>,
    pub polls_completed: u64,
    pub fetch_failures: u64,
    pub poll_failures: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_monitor_running(&self, v: bool) {
        self.monitor_running.store(v, Ordering::Relaxed);
    }

    pub fn record_poll(&self, at_ms: i64) {
        self.last_poll_at_ms.store(at_ms, Ordering::Relaxed);
        self.polls_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_fetch_failures(&self, n: u64) {
        self.fetch_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_poll_failures(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn monitor_running(&self) -> bool {
        self.monitor_running.load(Ordering::Relaxed)
    }

    pub fn last_poll_at_ms(&self) -> i64 {
        self.last_poll_at_ms.load(Ordering::Relaxed)
    }

    pub fn polls_completed(&self) -> u64 {
        self.polls_completed.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> HealthReport {
        let last = self.last_poll_at_ms();
        let running = self.monitor_running();
        HealthReport {
            status: if running { "ok" } else { "degraded" },
            monitor_running: running,
            last_poll_at_ms: (last > 0).then_some(last),
            polls_completed: self.polls_completed(),
            fetch_failures: self.fetch_failures(),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
        }
    }
}
