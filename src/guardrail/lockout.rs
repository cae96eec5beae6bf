use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clock::SharedClock;
use crate::types::LockoutState;

/// Process-wide self-exclusion state. Expiry is applied lazily: the first read
/// after `locked_until` clears the lock.
pub struct LockoutStore {
    state: Mutex<LockoutState>,
    clock: SharedClock,
}

impl LockoutStore {
    pub fn new(clock: SharedClock) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LockoutState::default()),
            clock,
        })
    }

    pub fn state(&self) -> LockoutState {
        let mut state = self.state.lock();
        expire(&mut state, self.clock.now());
        state.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state().is_locked
    }

    /// Lock for `hours` from now. Re-triggering while locked keeps whichever
    /// end time is later, so repeating the same call changes nothing.
    pub fn trigger_lockout(&self, reason: &str, hours: f64) -> LockoutState {
        let now = self.clock.now();
        let until = now + hours_to_duration(hours);
        let mut state = self.state.lock();
        expire(&mut state, now);

        let locked_until = match state.locked_until {
            Some(existing) if state.is_locked && existing > until => existing,
            _ => until,
        };
        *state = LockoutState {
            is_locked: true,
            reason: Some(reason.to_string()),
            locked_until: Some(locked_until),
        };
        warn!(reason = %reason, until = %locked_until, "[LOCKOUT] betting locked");
        state.clone()
    }

    /// Lock only if not already locked. Used by rule evaluation so a standing
    /// lockout is never shortened or relabelled by a later rule.
    pub fn lock_if_clear(&self, reason: &str, hours: f64) -> Option<LockoutState> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        expire(&mut state, now);
        if state.is_locked {
            return None;
        }
        let until = now + hours_to_duration(hours);
        *state = LockoutState {
            is_locked: true,
            reason: Some(reason.to_string()),
            locked_until: Some(until),
        };
        warn!(reason = %reason, until = %until, "[LOCKOUT] betting locked by rule");
        Some(state.clone())
    }

    /// Manual override. Clearing an unlocked store is a no-op.
    pub fn clear_lockout(&self) -> LockoutState {
        let mut state = self.state.lock();
        if state.is_locked {
            info!("[LOCKOUT] cleared");
        }
        *state = LockoutState::default();
        state.clone()
    }
}

fn expire(state: &mut LockoutState, now: DateTime<Utc>) {
    if let Some(until) = state.locked_until {
        if state.is_locked && now >= until {
            info!(until = %until, "[LOCKOUT] expired");
            *state = LockoutState::default();
        }
    }
}

fn hours_to_duration(hours: f64) -> Duration {
    let secs = if hours.is_finite() { (hours.max(0.0) * 3600.0).round() as i64 } else { 0 };
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::t0;

    #[test]
    fn trigger_then_expire() {
        let clock = ManualClock::new(t0());
        let store = LockoutStore::new(clock.clone());
        assert!(!store.is_locked());

        let state = store.trigger_lockout("tilt", 2.0);
        assert!(state.is_locked);
        assert_eq!(state.locked_until, Some(t0() + Duration::hours(2)));

        clock.advance(Duration::minutes(119));
        assert!(store.is_locked());
        clock.advance(Duration::minutes(1));
        assert_eq!(store.state(), LockoutState::default());
    }

    #[test]
    fn trigger_and_clear_are_idempotent() {
        let clock = ManualClock::new(t0());
        let store = LockoutStore::new(clock);
        let first = store.trigger_lockout("manual", 24.0);
        assert_eq!(store.trigger_lockout("manual", 24.0), first);
        // A shorter request never shortens the lock.
        assert_eq!(
            store.trigger_lockout("manual", 1.0).locked_until,
            first.locked_until
        );

        assert_eq!(store.clear_lockout(), LockoutState::default());
        assert_eq!(store.clear_lockout(), LockoutState::default());
    }

    #[test]
    fn rule_lock_does_not_override_standing_lock() {
        let clock = ManualClock::new(t0());
        let store = LockoutStore::new(clock);
        store.trigger_lockout("self-exclusion", 48.0);
        assert!(store.lock_if_clear("loss streak", 24.0).is_none());
        assert_eq!(store.state().reason.as_deref(), Some("self-exclusion"));

        store.clear_lockout();
        let state = store.lock_if_clear("loss streak", 24.0).unwrap();
        assert_eq!(state.locked_until, Some(t0() + Duration::hours(24)));
    }
}
