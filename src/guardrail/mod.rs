pub mod evaluator;
pub mod lockout;
pub mod session;

pub use evaluator::GuardrailEvaluator;
pub use lockout::LockoutStore;
pub use session::SessionTimer;

use crate::types::{GuardrailRule, RuleAction, RuleType};

/// Starting rule set until the bettor edits it.
pub fn default_rules() -> Vec<GuardrailRule> {
    let rule = |rule_type, threshold, action| GuardrailRule {
        rule_type,
        threshold,
        action,
        enabled: true,
    };
    vec![
        rule(RuleType::LossStreakLockout, 4.0, RuleAction::Lockout),
        rule(RuleType::MaxBetLimit, 100.0, RuleAction::Warn),
        rule(RuleType::DailyLossLimit, 250.0, RuleAction::Block),
        rule(RuleType::SessionTimeLimit, 120.0, RuleAction::Warn),
        rule(RuleType::CoolDownPeriod, 15.0, RuleAction::Warn),
    ]
}
