use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::strength_bands;

// ---------------------------------------------------------------------------
// Market snapshots
// ---------------------------------------------------------------------------

/// One observation of a match's betting market at a single sportsbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub match_id: String,
    pub timestamp: DateTime<Utc>,
    pub spread_home: f64,
    pub spread_away: f64,
    pub total: f64,
    #[serde(default)]
    pub moneyline_home: f64,
    #[serde(default)]
    pub moneyline_away: f64,
    /// Share of bet count on each side, 0-100.
    #[serde(default)]
    pub public_pct_home: f64,
    #[serde(default)]
    pub public_pct_away: f64,
    /// Share of money wagered on each side, 0-100.
    #[serde(default)]
    pub money_pct_home: f64,
    #[serde(default)]
    pub money_pct_away: f64,
    #[serde(default = "default_sportsbook")]
    pub sportsbook: String,
}

fn default_sportsbook() -> String {
    "consensus".to_string()
}

impl MarketSnapshot {
    /// Public share on `side`. Totals carry no public split and read as 0.
    pub fn public_pct(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.public_pct_home,
            Side::Away => self.public_pct_away,
            Side::Over | Side::Under => 0.0,
        }
    }

    pub fn money_pct(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.money_pct_home,
            Side::Away => self.money_pct_away,
            Side::Over | Side::Under => 0.0,
        }
    }

    pub fn line(&self, market: MarketType) -> f64 {
        match market {
            MarketType::Spread => self.spread_home,
            MarketType::Total => self.total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Spread,
    Total,
}

impl MarketType {
    /// Side that became more expensive when this market's line moved by `delta`.
    ///
    /// A falling home spread (-3 to -5.5) means home is laying more points.
    /// A rising total means the over costs more.
    pub fn side_for_move(self, delta: f64) -> Side {
        match self {
            MarketType::Spread if delta < 0.0 => Side::Home,
            MarketType::Spread => Side::Away,
            MarketType::Total if delta > 0.0 => Side::Over,
            MarketType::Total => Side::Under,
        }
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketType::Spread => write!(f, "spread"),
            MarketType::Total => write!(f, "total"),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
    Over,
    Under,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
            Side::Over => Side::Under,
            Side::Under => Side::Over,
        }
    }

    /// Market a side belongs to: home/away on the spread, over/under on the total.
    pub fn market(self) -> MarketType {
        match self {
            Side::Home | Side::Away => MarketType::Spread,
            Side::Over | Side::Under => MarketType::Total,
        }
    }

    /// +1 for home/over, -1 for away/under.
    pub fn sign(self) -> f64 {
        match self {
            Side::Home | Side::Over => 1.0,
            Side::Away | Side::Under => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Over => "over",
            Side::Under => "under",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    SteamMove,
    ReverseLine,
    LineFreeze,
    WhaleBet,
    SyndicatePlay,
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalType::SteamMove => "steam_move",
            SignalType::ReverseLine => "reverse_line",
            SignalType::LineFreeze => "line_freeze",
            SignalType::WhaleBet => "whale_bet",
            SignalType::SyndicatePlay => "syndicate_play",
        };
        write!(f, "{s}")
    }
}

/// Ordered weakest first so strengths compare with `<`/`max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    /// Grade a ratio against the shared bands: weak < 1.5x, moderate < 2.5x, strong otherwise.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < strength_bands::WEAK_MAX {
            Strength::Weak
        } else if ratio < strength_bands::MODERATE_MAX {
            Strength::Moderate
        } else {
            Strength::Strong
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strength::Weak => "weak",
            Strength::Moderate => "moderate",
            Strength::Strong => "strong",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpSignal {
    pub id: String,
    pub match_id: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub side: Side,
    pub strength: Strength,
    pub detected_at: DateTime<Utc>,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Sharp score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpSide {
    Home,
    Away,
    Over,
    Under,
    Neutral,
}

impl From<Side> for SharpSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Home => SharpSide::Home,
            Side::Away => SharpSide::Away,
            Side::Over => SharpSide::Over,
            Side::Under => SharpSide::Under,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpScoreResult {
    pub match_id: String,
    pub sharp_score: f64,
    pub confidence: u32,
    pub sharp_side: SharpSide,
    pub has_reverse_line_movement: bool,
    pub signal_types: Vec<SignalType>,
}

// ---------------------------------------------------------------------------
// Steam alerts
// ---------------------------------------------------------------------------

/// A live steam alert kept by the monitor until the caller dismisses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamMove {
    pub id: String,
    pub match_id: String,
    pub sportsbook: String,
    pub market_type: MarketType,
    pub side: Side,
    /// Absolute line movement in points.
    pub movement: f64,
    pub from_value: f64,
    pub to_value: f64,
    pub strength: Strength,
    pub window_started_at: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub dismissed: bool,
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Push,
    Cancelled,
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Push => "push",
            BetStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    Spread,
    Total,
    Moneyline,
    Prop,
    Parlay,
}

impl std::fmt::Display for BetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetType::Spread => "spread",
            BetType::Total => "total",
            BetType::Moneyline => "moneyline",
            BetType::Prop => "prop",
            BetType::Parlay => "parlay",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: String,
    pub match_id: String,
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    pub stake: f64,
    /// American odds.
    pub odds: f64,
    pub status: BetStatus,
    #[serde(default)]
    pub result_profit: Option<f64>,
    #[serde(default)]
    pub league: Option<String>,
    /// Predicted outcome side, free text ("home", "over", a team name).
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub bet_type: Option<BetType>,
}

impl BetRecord {
    pub fn is_settled(&self) -> bool {
        self.status != BetStatus::Pending
    }

    /// Realised profit; a settled bet with no recorded profit counts as 0.
    pub fn profit(&self) -> f64 {
        self.result_profit.unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Guardrails
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    LossStreakLockout,
    MaxBetLimit,
    DailyLossLimit,
    SessionTimeLimit,
    CoolDownPeriod,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleType::LossStreakLockout => "loss_streak_lockout",
            RuleType::MaxBetLimit => "max_bet_limit",
            RuleType::DailyLossLimit => "daily_loss_limit",
            RuleType::SessionTimeLimit => "session_time_limit",
            RuleType::CoolDownPeriod => "cool_down_period",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Warn,
    Block,
    Lockout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Streak length, currency amount or minutes depending on `rule_type`.
    pub threshold: f64,
    pub action: RuleAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Evaluation result for one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologicalGuardrail {
    pub rule: GuardrailRule,
    pub current_value: f64,
    pub is_triggered: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LockoutState {
    pub is_locked: bool,
    pub reason: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
}
