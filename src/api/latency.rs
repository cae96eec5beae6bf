//! In-memory histogram of steam monitor poll cycles: list, fan-out fetch,
//! scan and alert merge for every tracked match.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Values stored in microseconds. The monitor records, the API reads.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl LatencyStats {
    /// 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 100_000_000) as u64;
        let _ = self.inner.lock().record(us);
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> LatencySummary {
        let h = self.inner.lock();
        if h.len() == 0 {
            return LatencySummary {
                samples: 0,
                p50_ms: None,
                p95_ms: None,
                p99_ms: None,
                max_ms: None,
            };
        }
        let ms = |us: u64| Some(us as f64 / 1000.0);
        LatencySummary {
            samples: h.len(),
            p50_ms: ms(h.value_at_quantile(0.5)),
            p95_ms: ms(h.value_at_quantile(0.95)),
            p99_ms: ms(h.value_at_quantile(0.99)),
            max_ms: ms(h.max()),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
