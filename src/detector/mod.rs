pub mod classifier;
pub mod freeze;
pub mod money_flow;
pub mod reverse_line;
pub mod signal_detector;
pub mod steam;

use chrono::{DateTime, Utc};

use crate::types::{Side, SignalType, Strength};

pub use signal_detector::{detect, SignalDetector};
pub use steam::SteamDetection;

/// Raw output of a single rule before it is stamped into a `SharpSignal`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub signal_type: SignalType,
    pub side: Side,
    pub strength: Strength,
    pub detected_at: DateTime<Utc>,
    pub description: String,
}
