//! Restart pacing for automatic witness recovery.
//!
//! Pure state machine: every time value is passed in as epoch milliseconds,
//! so the watch loop owns the clock and tests drive it directly.

use serde::{Deserialize, Serialize};

/// Exponential backoff with a failure budget and hold-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
    /// Restarts allowed inside `budget_window_ms` before hold-down. 0 = unlimited.
    pub failure_budget: u32,
    pub budget_window_ms: u64,
    pub holddown_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 5_000,
            multiplier: 2.0,
            max_backoff_ms: 300_000,
            failure_budget: 5,
            budget_window_ms: 1_800_000,
            holddown_ms: 1_800_000,
        }
    }
}

impl RestartPolicy {
    fn backoff(&self, attempt: u32) -> u64 {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_backoff_ms as f64 * self.multiplier.powi(exp);
        if raw.is_finite() && raw < self.max_backoff_ms as f64 {
            raw as u64
        } else {
            self.max_backoff_ms
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RestartState {
    Ready,
    Backoff { attempt: u32, until_ms: u64 },
    HoldDown { until_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart now; the next failure waits at least `next_after_ms`.
    Restart { next_after_ms: u64 },
    /// Still backing off from a recent restart.
    Wait { remaining_ms: u64 },
    /// Budget exhausted; leave the session alone for `remaining_ms`.
    HoldDown { remaining_ms: u64 },
}

/// Decides whether an unhealthy witness may be restarted right now.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    state: RestartState,
    restarts: Vec<u64>,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            state: RestartState::Ready,
            restarts: Vec::new(),
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    pub fn state(&self) -> &RestartState {
        &self.state
    }

    pub fn is_hold_down(&self) -> bool {
        matches!(self.state, RestartState::HoldDown { .. })
    }

    /// Consult the tracker after observing an unhealthy witness at `now_ms`.
    ///
    /// A `Restart` answer counts against the budget.
    pub fn on_unhealthy(&mut self, now_ms: u64) -> RestartDecision {
        let attempt = match self.state {
            RestartState::HoldDown { until_ms } if now_ms < until_ms => {
                return RestartDecision::HoldDown {
                    remaining_ms: until_ms - now_ms,
                };
            }
            RestartState::HoldDown { .. } => {
                self.restarts.clear();
                0
            }
            RestartState::Backoff { until_ms, .. } if now_ms < until_ms => {
                return RestartDecision::Wait {
                    remaining_ms: until_ms - now_ms,
                };
            }
            RestartState::Backoff { attempt, .. } => attempt + 1,
            RestartState::Ready => 0,
        };

        let window_start = now_ms.saturating_sub(self.policy.budget_window_ms);
        self.restarts.retain(|&ts| ts >= window_start);

        let budget = self.policy.failure_budget as usize;
        if budget > 0 && self.restarts.len() >= budget {
            let until_ms = now_ms.saturating_add(self.policy.holddown_ms);
            self.state = RestartState::HoldDown { until_ms };
            return RestartDecision::HoldDown {
                remaining_ms: self.policy.holddown_ms,
            };
        }

        self.restarts.push(now_ms);
        let next_after_ms = self.policy.backoff(attempt);
        self.state = RestartState::Backoff {
            attempt,
            until_ms: now_ms.saturating_add(next_after_ms),
        };
        RestartDecision::Restart { next_after_ms }
    }

    /// The witness was observed healthy: forget backoff and history.
    pub fn on_healthy(&mut self) {
        if !matches!(self.state, RestartState::HoldDown { .. }) {
            self.state = RestartState::Ready;
            self.restarts.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RestartPolicy {
        RestartPolicy {
            initial_backoff_ms: 1_000,
            multiplier: 2.0,
            max_backoff_ms: 5_000,
            failure_budget: 3,
            budget_window_ms: 60_000,
            holddown_ms: 120_000,
        }
    }

    #[test]
    fn default_policy_is_sane() {
        let p = RestartPolicy::default();
        assert!(p.initial_backoff_ms <= p.max_backoff_ms);
        assert!(p.failure_budget > 0);
    }

    #[test]
    fn first_unhealthy_restarts_immediately() {
        let mut t = RestartTracker::new(policy());
        assert_eq!(t.on_unhealthy(0), RestartDecision::Restart { next_after_ms: 1_000 });
        assert_eq!(t.state(), &RestartState::Backoff { attempt: 0, until_ms: 1_000 });
    }

    #[test]
    fn waits_inside_backoff() {
        let mut t = RestartTracker::new(policy());
        t.on_unhealthy(0);
        assert_eq!(t.on_unhealthy(400), RestartDecision::Wait { remaining_ms: 600 });
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut t = RestartTracker::new(RestartPolicy {
            failure_budget: 0,
            ..policy()
        });
        let mut now = 0;
        let mut delays = Vec::new();
        for _ in 0..5 {
            match t.on_unhealthy(now) {
                RestartDecision::Restart { next_after_ms } => {
                    delays.push(next_after_ms);
                    now += next_after_ms;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn budget_exhaustion_holds_down() {
        let mut t = RestartTracker::new(policy());
        assert!(matches!(t.on_unhealthy(0), RestartDecision::Restart { .. }));
        assert!(matches!(t.on_unhealthy(1_000), RestartDecision::Restart { .. }));
        assert!(matches!(t.on_unhealthy(3_000), RestartDecision::Restart { .. }));
        assert_eq!(
            t.on_unhealthy(7_000),
            RestartDecision::HoldDown { remaining_ms: 120_000 }
        );
        assert!(t.is_hold_down());
        assert_eq!(
            t.on_unhealthy(8_000),
            RestartDecision::HoldDown { remaining_ms: 119_000 }
        );
    }

    #[test]
    fn healthy_during_holddown_does_not_clear_it() {
        let mut t = RestartTracker::new(RestartPolicy {
            failure_budget: 1,
            ..policy()
        });
        t.on_unhealthy(0);
        assert!(matches!(t.on_unhealthy(1_000), RestartDecision::HoldDown { .. }));
        t.on_healthy();
        assert!(t.is_hold_down());
    }

    #[test]
    fn holddown_expiry_starts_fresh() {
        let mut t = RestartTracker::new(RestartPolicy {
            failure_budget: 1,
            ..policy()
        });
        t.on_unhealthy(0);
        t.on_unhealthy(1_000);
        assert_eq!(
            t.on_unhealthy(121_000),
            RestartDecision::Restart { next_after_ms: 1_000 }
        );
    }

    #[test]
    fn old_restarts_leave_the_window() {
        let mut t = RestartTracker::new(policy());
        t.on_unhealthy(0);
        t.on_unhealthy(1_000);
        assert_eq!(
            t.on_unhealthy(100_000),
            RestartDecision::Restart { next_after_ms: 4_000 }
        );
    }

    #[test]
    fn healthy_resets_backoff() {
        let mut t = RestartTracker::new(policy());
        t.on_unhealthy(0);
        t.on_unhealthy(1_000);
        t.on_healthy();
        assert_eq!(t.state(), &RestartState::Ready);
        assert_eq!(
            t.on_unhealthy(2_000),
            RestartDecision::Restart { next_after_ms: 1_000 }
        );
    }

    #[test]
    fn policy_deserializes_partial_toml_table() {
        let p: RestartPolicy = toml::from_str("failure_budget = 9").expect("parse");
        assert_eq!(p.failure_budget, 9);
        assert_eq!(p.initial_backoff_ms, RestartPolicy::default().initial_backoff_ms);
    }
}
