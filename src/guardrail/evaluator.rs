use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::config::GuardrailConfig;
use crate::guardrail::{LockoutStore, SessionTimer};
use crate::types::{
    BetRecord, BetStatus, GuardrailRule, PsychologicalGuardrail, RuleAction, RuleType,
};

/// Evaluates the bettor's rules against the ledger. Evaluation never edits the
/// rules; the only side effect is writing a lockout when a triggered rule's
/// action is `lockout`.
pub struct GuardrailEvaluator {
    cfg: GuardrailConfig,
    lockout: Arc<LockoutStore>,
    session: Arc<SessionTimer>,
    clock: SharedClock,
}

impl GuardrailEvaluator {
    pub fn new(
        cfg: GuardrailConfig,
        lockout: Arc<LockoutStore>,
        session: Arc<SessionTimer>,
        clock: SharedClock,
    ) -> Self {
        Self {
            cfg,
            lockout,
            session,
            clock,
        }
    }

    pub fn lockout(&self) -> &Arc<LockoutStore> {
        &self.lockout
    }

    pub fn session(&self) -> &Arc<SessionTimer> {
        &self.session
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.cfg
    }

    /// One result per rule, in rule order. Disabled rules are reported with
    /// their current value but never trigger.
    pub fn evaluate(&self, bets: &[BetRecord], rules: &[GuardrailRule]) -> Vec<PsychologicalGuardrail> {
        let now = self.clock.now();
        let day_start = local_midnight(now, &self.cfg);

        rules
            .iter()
            .map(|rule| {
                let (current_value, triggered, detail) = match rule.rule_type {
                    RuleType::LossStreakLockout => {
                        let streak = loss_streak(bets) as f64;
                        (
                            streak,
                            streak >= rule.threshold,
                            format!("{streak} consecutive losses (limit {})", rule.threshold),
                        )
                    }
                    RuleType::MaxBetLimit => {
                        let largest = largest_stake_since(bets, day_start);
                        (
                            largest,
                            largest >= rule.threshold,
                            format!("largest stake today {largest:.2} (limit {:.2})", rule.threshold),
                        )
                    }
                    RuleType::DailyLossLimit => {
                        let loss = net_loss_since(bets, day_start);
                        (
                            loss,
                            loss >= rule.threshold,
                            format!("net loss today {loss:.2} (limit {:.2})", rule.threshold),
                        )
                    }
                    RuleType::SessionTimeLimit => match self.session.elapsed_minutes(now) {
                        Some(elapsed) => {
                            let remaining = (rule.threshold - elapsed).max(0.0);
                            (
                                remaining,
                                remaining <= 0.0,
                                format!("{remaining:.0} session minutes remaining"),
                            )
                        }
                        None => (rule.threshold, false, "no active session".to_string()),
                    },
                    RuleType::CoolDownPeriod => match minutes_since_last_loss(bets, now) {
                        Some(minutes) => (
                            minutes,
                            minutes < rule.threshold,
                            format!(
                                "{minutes:.0} minutes since last loss (cool-down {})",
                                rule.threshold
                            ),
                        ),
                        None => (0.0, false, "no settled losses".to_string()),
                    },
                };

                let is_triggered = rule.enabled && triggered;
                if is_triggered {
                    self.apply_action(rule, &detail);
                }

                PsychologicalGuardrail {
                    rule: rule.clone(),
                    current_value,
                    is_triggered,
                    message: message(rule, is_triggered, &detail),
                }
            })
            .collect()
    }

    fn apply_action(&self, rule: &GuardrailRule, detail: &str) {
        match rule.action {
            RuleAction::Lockout => {
                let reason = format!("{}: {detail}", rule.rule_type);
                if self.lockout.lock_if_clear(&reason, self.cfg.lockout_hours).is_none() {
                    debug!(rule = %rule.rule_type, "[GUARDRAIL] already locked, lockout unchanged");
                }
            }
            RuleAction::Block | RuleAction::Warn => {
                warn!(rule = %rule.rule_type, action = ?rule.action, "[GUARDRAIL] {detail}");
            }
        }
    }
}

fn message(rule: &GuardrailRule, triggered: bool, detail: &str) -> String {
    if !rule.enabled {
        return format!("disabled: {detail}");
    }
    if !triggered {
        return detail.to_string();
    }
    match rule.action {
        RuleAction::Warn => format!("warning: {detail}"),
        RuleAction::Block => format!("blocked: {detail}"),
        RuleAction::Lockout => format!("locked out: {detail}"),
    }
}

// ---------------------------------------------------------------------------
// Rule inputs
// ---------------------------------------------------------------------------

/// Consecutive losses counting back from the most recently settled bet.
/// Cancelled bets are skipped; a win or push ends the streak.
pub fn loss_streak(bets: &[BetRecord]) -> usize {
    let mut settled: Vec<&BetRecord> = bets
        .iter()
        .filter(|b| b.is_settled() && b.settled_at.is_some())
        .collect();
    settled.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));

    let mut streak = 0;
    for bet in settled {
        match bet.status {
            BetStatus::Lost => streak += 1,
            BetStatus::Cancelled => continue,
            _ => break,
        }
    }
    streak
}

fn largest_stake_since(bets: &[BetRecord], since: DateTime<Utc>) -> f64 {
    bets.iter()
        .filter(|b| b.placed_at >= since)
        .map(|b| b.stake)
        .fold(0.0, f64::max)
}

fn net_loss_since(bets: &[BetRecord], since: DateTime<Utc>) -> f64 {
    let net: f64 = bets
        .iter()
        .filter(|b| b.settled_at.is_some_and(|at| at >= since))
        .map(BetRecord::profit)
        .sum();
    (-net).max(0.0)
}

fn minutes_since_last_loss(bets: &[BetRecord], now: DateTime<Utc>) -> Option<f64> {
    let last = bets
        .iter()
        .filter(|b| b.status == BetStatus::Lost)
        .filter_map(|b| b.settled_at)
        .max()?;
    Some(((now - last).num_seconds().max(0) as f64) / 60.0)
}

/// Start of the bettor's current local day, in UTC.
pub fn local_midnight(now: DateTime<Utc>, cfg: &GuardrailConfig) -> DateTime<Utc> {
    let local = now.with_timezone(&cfg.utc_offset);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);
    let offset = Duration::seconds(i64::from(cfg.utc_offset.local_minus_utc()));
    Utc.from_utc_datetime(&(midnight - offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{pending_bet, secs, settled_bet, t0};
    use chrono::FixedOffset;

    fn rule(rule_type: RuleType, threshold: f64, action: RuleAction) -> GuardrailRule {
        GuardrailRule {
            rule_type,
            threshold,
            action,
            enabled: true,
        }
    }

    fn evaluator_at(now: DateTime<Utc>) -> (GuardrailEvaluator, Arc<ManualClock>) {
        let clock = ManualClock::new(now);
        let lockout = LockoutStore::new(clock.clone());
        let evaluator = GuardrailEvaluator::new(
            GuardrailConfig::default(),
            lockout,
            SessionTimer::new(),
            clock.clone(),
        );
        (evaluator, clock)
    }

    fn streak_of(statuses: &[BetStatus]) -> Vec<BetRecord> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| settled_bet(&format!("b{i}"), 10.0, *status, secs(i as i64 * 60), 30))
            .collect()
    }

    #[test]
    fn loss_streak_counts_most_recent_losses() {
        use BetStatus::*;
        assert_eq!(loss_streak(&streak_of(&[Won, Lost, Lost, Lost])), 3);
        assert_eq!(loss_streak(&streak_of(&[Lost, Lost, Won])), 0);
        assert_eq!(loss_streak(&streak_of(&[Lost, Push, Lost])), 1);
        assert_eq!(loss_streak(&streak_of(&[Lost, Lost, Cancelled])), 2);
        assert_eq!(loss_streak(&[]), 0);
    }

    #[test]
    fn loss_streak_orders_by_settlement_not_placement() {
        // Placed first, settled last.
        let late_loss = settled_bet("late", 10.0, BetStatus::Lost, secs(0), 3600);
        let early_win = settled_bet("early", 10.0, BetStatus::Won, secs(60), 60);
        assert_eq!(loss_streak(&[late_loss, early_win]), 1);
    }

    #[test]
    fn loss_streak_rule_triggers_iff_streak_reaches_threshold() {
        use BetStatus::*;
        let (evaluator, _) = evaluator_at(secs(86_400));
        let rules = [rule(RuleType::LossStreakLockout, 3.0, RuleAction::Warn)];

        for (history, expected) in [
            (vec![Lost, Lost], false),
            (vec![Lost, Lost, Lost], true),
            (vec![Lost, Lost, Lost, Won], false),
            (vec![Won, Lost, Lost, Lost, Lost], true),
            (vec![Lost, Lost, Push], false),
        ] {
            let result = evaluator.evaluate(&streak_of(&history), &rules);
            assert_eq!(result[0].is_triggered, expected, "{history:?}");
        }
    }

    #[test]
    fn lockout_action_writes_lockout_state() {
        use BetStatus::*;
        let (evaluator, _) = evaluator_at(secs(3600));
        let rules = [rule(RuleType::LossStreakLockout, 2.0, RuleAction::Lockout)];
        let result = evaluator.evaluate(&streak_of(&[Lost, Lost]), &rules);
        assert!(result[0].is_triggered);
        assert!(result[0].message.starts_with("locked out"));

        let state = evaluator.lockout().state();
        assert!(state.is_locked);
        assert_eq!(state.locked_until, Some(secs(3600) + Duration::hours(24)));
    }

    #[test]
    fn block_and_warn_are_advisory() {
        use BetStatus::*;
        let (evaluator, _) = evaluator_at(secs(3600));
        let rules = [
            rule(RuleType::LossStreakLockout, 1.0, RuleAction::Block),
            rule(RuleType::LossStreakLockout, 1.0, RuleAction::Warn),
        ];
        let result = evaluator.evaluate(&streak_of(&[Lost]), &rules);
        assert!(result.iter().all(|r| r.is_triggered));
        assert!(!evaluator.lockout().is_locked());
    }

    #[test]
    fn disabled_rules_never_trigger() {
        use BetStatus::*;
        let (evaluator, _) = evaluator_at(secs(3600));
        let mut disabled = rule(RuleType::LossStreakLockout, 1.0, RuleAction::Lockout);
        disabled.enabled = false;
        let result = evaluator.evaluate(&streak_of(&[Lost, Lost]), &[disabled]);
        assert_eq!(result[0].current_value, 2.0);
        assert!(!result[0].is_triggered);
        assert!(!evaluator.lockout().is_locked());
    }

    #[test]
    fn daily_rules_only_see_today() {
        // t0 is 17:00 UTC; yesterday's bets fall outside the window.
        let (evaluator, _) = evaluator_at(t0());
        let bets = vec![
            settled_bet("old", 500.0, BetStatus::Lost, t0() - Duration::days(1), 60),
            settled_bet("a", 50.0, BetStatus::Lost, t0() - Duration::hours(3), 60),
            settled_bet("b", 110.0, BetStatus::Won, t0() - Duration::hours(2), 60),
            pending_bet("c", 80.0, t0() - Duration::hours(1)),
        ];
        let rules = [
            rule(RuleType::MaxBetLimit, 100.0, RuleAction::Warn),
            rule(RuleType::DailyLossLimit, 40.0, RuleAction::Block),
        ];
        let result = evaluator.evaluate(&bets, &rules);

        assert_eq!(result[0].current_value, 110.0);
        assert!(result[0].is_triggered);
        // -50 + 100 = +50 net: no loss today.
        assert_eq!(result[1].current_value, 0.0);
        assert!(!result[1].is_triggered);
    }

    #[test]
    fn local_midnight_respects_offset() {
        // 2024-11-03 17:00 UTC is 2024-11-03 12:00 at UTC-5.
        let cfg = GuardrailConfig {
            utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
            ..GuardrailConfig::default()
        };
        assert_eq!(local_midnight(t0(), &cfg), t0() - Duration::hours(12));
        assert_eq!(
            local_midnight(t0(), &GuardrailConfig::default()),
            t0() - Duration::hours(17)
        );
    }

    #[test]
    fn session_time_counts_down() {
        let (evaluator, clock) = evaluator_at(t0());
        let rules = [rule(RuleType::SessionTimeLimit, 60.0, RuleAction::Warn)];

        let idle = evaluator.evaluate(&[], &rules);
        assert_eq!(idle[0].current_value, 60.0);
        assert!(!idle[0].is_triggered);

        evaluator.session().start(t0());
        clock.advance(Duration::minutes(45));
        let result = evaluator.evaluate(&[], &rules);
        assert_eq!(result[0].current_value, 15.0);
        assert!(!result[0].is_triggered);

        clock.advance(Duration::minutes(20));
        let result = evaluator.evaluate(&[], &rules);
        assert_eq!(result[0].current_value, 0.0);
        assert!(result[0].is_triggered);
    }

    #[test]
    fn cool_down_holds_until_threshold_elapses() {
        let (evaluator, clock) = evaluator_at(secs(0));
        let bets = vec![settled_bet("a", 20.0, BetStatus::Lost, secs(-600), 600)];
        let rules = [rule(RuleType::CoolDownPeriod, 30.0, RuleAction::Block)];

        assert!(evaluator.evaluate(&bets, &rules)[0].is_triggered);
        clock.advance(Duration::minutes(30));
        let result = evaluator.evaluate(&bets, &rules);
        assert_eq!(result[0].current_value, 30.0);
        assert!(!result[0].is_triggered);

        assert!(!evaluator.evaluate(&[], &rules)[0].is_triggered);
    }
}
