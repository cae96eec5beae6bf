use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::{AppError, Result};

/// Default poll interval for the steam move monitor (seconds).
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Sliding window used by the steam move rule (seconds).
pub const STEAM_WINDOW_SECS: i64 = 300;

/// Minimum consistent line movement (points) inside the window to count as steam.
pub const STEAM_THRESHOLD_POINTS: f64 = 2.0;

/// A history needs at least this many snapshots before any rule can fire.
/// Anything shorter is "not enough data", never an error.
pub const MIN_HISTORY_LEN: usize = 2;

/// Capacity of the broadcast channel carrying alert updates to subscribers.
pub const ALERT_CHANNEL_CAPACITY: usize = 1024;

/// Per-request timeout for the HTTP snapshot feed.
pub const FEED_TIMEOUT_SECS: u64 = 10;

/// Strength bands, expressed as multiples of the detector's strength unit.
pub mod strength_bands {
    pub const WEAK_MAX: f64 = 1.5;
    pub const MODERATE_MAX: f64 = 2.5;
}

/// Sharp score weights.
pub mod score_weights {
    pub const BASE_SCORE: f64 = 50.0;
    pub const STEAM_MOVE: f64 = 15.0;
    pub const REVERSE_LINE: f64 = 12.0;
    pub const MONEY_FLOW: f64 = 10.0;
    pub const LINE_FREEZE: f64 = 8.0;

    pub const WEAK: f64 = 0.5;
    pub const MODERATE: f64 = 1.0;
    pub const STRONG: f64 = 1.5;

    pub const CONFIDENCE_BASE: u32 = 40;
    pub const CONFIDENCE_PER_TYPE: u32 = 10;

    /// Points of score per point of (money% - public%) on the home side.
    pub const SKEW_FACTOR: f64 = 0.2;
    /// The skew term never moves the score by more than this.
    pub const SKEW_CAP: f64 = 5.0;
}

/// Exposure-to-bankroll ratio bands.
pub mod risk_bands {
    pub const LOW_MAX: f64 = 0.10;
    pub const MODERATE_MAX: f64 = 0.20;
    pub const HIGH_MAX: f64 = 0.35;
}

// ---------------------------------------------------------------------------
// Component configs
// ---------------------------------------------------------------------------

/// Thresholds for the signal detection rules.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub steam_window_secs: i64,
    pub steam_threshold: f64,
    /// Movement (points) that counts as 1x when grading steam strength.
    pub strength_unit: f64,
    /// Public share (percent) above which a side counts as the public side for RLM.
    pub rlm_public_pct: f64,
    /// Line must move more than this (points) against the public to count as RLM.
    pub rlm_min_move: f64,
    /// Public share (percent) above which the action counts as lopsided.
    pub freeze_public_pct: f64,
    /// Maximum drift (points) still considered a frozen line.
    pub freeze_tolerance: f64,
    /// Minimum duration of a lopsided run before a freeze is reported.
    pub freeze_min_secs: i64,
    /// Money% minus public% (points) needed for a whale bet.
    pub whale_gap: f64,
    /// Consecutive trailing snapshots with the gap before escalating to syndicate play.
    pub syndicate_min_snapshots: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            steam_window_secs: STEAM_WINDOW_SECS,
            steam_threshold: STEAM_THRESHOLD_POINTS,
            strength_unit: 1.0,
            rlm_public_pct: 60.0,
            rlm_min_move: 0.5,
            freeze_public_pct: 65.0,
            freeze_tolerance: 0.25,
            freeze_min_secs: 1800,
            whale_gap: 15.0,
            syndicate_min_snapshots: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub detector: DetectorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            detector: DetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    /// Duration of a rule-triggered lockout.
    pub lockout_hours: f64,
    /// Offset used to find the bettor's local midnight for daily rules.
    pub utc_offset: FixedOffset,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            lockout_hours: 24.0,
            utc_offset: utc(),
        }
    }
}

/// Tunables for the withdrawal recommendation.
#[derive(Debug, Clone)]
pub struct WithdrawalPolicy {
    /// Share of profit kept in the bankroll for compounding.
    pub growth_reserve_ratio: f64,
    /// Share of withdrawable profit in the safe tier.
    pub safe_fraction: f64,
    /// How many times the bankroll is expected to turn over per month.
    pub monthly_turnover: f64,
    /// Score at or above which the recommendation is considered sustainable.
    pub sustainable_score: u32,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            growth_reserve_ratio: 0.4,
            safe_fraction: 0.25,
            monthly_turnover: 4.0,
            sustainable_score: 60,
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

// ---------------------------------------------------------------------------
// Process config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub poll_interval_secs: u64,
    pub steam_window_secs: i64,
    pub steam_threshold: f64,
    /// JSON snapshot feed polled by the monitor (FEED_URL). When unset the monitor
    /// reads the in-memory store fed through the API.
    pub feed_url: Option<String>,
    pub starting_bankroll: f64,
    pub current_bankroll: f64,
    pub monthly_target: f64,
    pub expected_edge: f64,
    pub lockout_hours: f64,
    /// Bettor's UTC offset in minutes (UTC_OFFSET_MINUTES), used for "today".
    pub utc_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| POLL_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(POLL_INTERVAL_SECS),
            steam_window_secs: std::env::var("STEAM_WINDOW_SECS")
                .unwrap_or_else(|_| STEAM_WINDOW_SECS.to_string())
                .parse::<i64>()
                .unwrap_or(STEAM_WINDOW_SECS),
            steam_threshold: std::env::var("STEAM_THRESHOLD")
                .unwrap_or_else(|_| STEAM_THRESHOLD_POINTS.to_string())
                .parse::<f64>()
                .unwrap_or(STEAM_THRESHOLD_POINTS),
            feed_url: std::env::var("FEED_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            starting_bankroll: std::env::var("STARTING_BANKROLL")
                .unwrap_or_else(|_| "1000".to_string())
                .parse::<f64>()
                .unwrap_or(1000.0),
            current_bankroll: std::env::var("CURRENT_BANKROLL")
                .unwrap_or_else(|_| "1000".to_string())
                .parse::<f64>()
                .unwrap_or(1000.0),
            monthly_target: std::env::var("MONTHLY_TARGET")
                .unwrap_or_else(|_| "0".to_string())
                .parse::<f64>()
                .unwrap_or(0.0),
            expected_edge: std::env::var("EXPECTED_EDGE")
                .unwrap_or_else(|_| "0.02".to_string())
                .parse::<f64>()
                .unwrap_or(0.02),
            lockout_hours: std::env::var("LOCKOUT_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse::<f64>()
                .unwrap_or(24.0),
            utc_offset_minutes: std::env::var("UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "0".to_string())
                .parse::<i32>()
                .map_err(|_| AppError::Config("UTC_OFFSET_MINUTES must be an integer".to_string()))?,
        };

        if cfg.poll_interval_secs == 0 {
            return Err(AppError::Config("POLL_INTERVAL_SECS must be > 0".to_string()));
        }
        if cfg.steam_window_secs <= 0 || cfg.steam_threshold <= 0.0 {
            return Err(AppError::Config(
                "STEAM_WINDOW_SECS and STEAM_THRESHOLD must be positive".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            steam_window_secs: self.steam_window_secs,
            steam_threshold: self.steam_threshold,
            ..DetectorConfig::default()
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            detector: self.detector_config(),
        }
    }

    pub fn guardrail_config(&self) -> Result<GuardrailConfig> {
        let utc_offset = FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "UTC_OFFSET_MINUTES out of range: {}",
                self.utc_offset_minutes
            ))
        })?;
        Ok(GuardrailConfig {
            lockout_hours: self.lockout_hours,
            utc_offset,
        })
    }
}
