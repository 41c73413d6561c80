use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// The single active admission policy. `None` at the gateway level disables
/// rate limiting entirely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPlan {
    pub name: String,
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl RateLimitPlan {
    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_window == 0 {
            return Err("requestsPerWindow must be positive".to_string());
        }
        if self.window_seconds == 0 {
            return Err("windowSeconds must be positive".to_string());
        }
        Ok(())
    }
}

/// Outcome of an admission check, echoed back as RateLimit-* headers.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct Admission {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: u64,
}

#[derive(Debug)]
struct WindowState {
    requests: u32,
    window_start: u64,
}

/// Fixed-window counter per client IP under one global lock. The critical
/// section is a map probe and a couple of integer ops.
#[derive(Debug, Default)]
pub struct RateLimiter {
    states: Mutex<HashMap<String, WindowState>>,
}

impl RateLimiter {
    pub fn admit(&self, client_ip: &str, plan: Option<&RateLimitPlan>, now: u64) -> Admission {
        let Some(plan) = plan else {
            return Admission {
                allowed: true,
                ..Admission::default()
            };
        };

        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(client_ip.to_string())
            .or_insert(WindowState {
                requests: 0,
                window_start: now,
            });

        if now.saturating_sub(state.window_start) >= plan.window_seconds {
            state.requests = 0;
            state.window_start = now;
        }

        let remaining = plan.requests_per_window.saturating_sub(state.requests);
        let reset_seconds = plan
            .window_seconds
            .saturating_sub(now.saturating_sub(state.window_start));

        if state.requests >= plan.requests_per_window {
            return Admission {
                allowed: false,
                limit: plan.requests_per_window,
                remaining,
                reset_seconds,
            };
        }

        state.requests += 1;
        Admission {
            allowed: true,
            limit: plan.requests_per_window,
            remaining: remaining - 1,
            reset_seconds,
        }
    }

    /// Drops every per-IP window. Called whenever the plan changes.
    pub fn clear(&self) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(requests: u32, window: u64) -> RateLimitPlan {
        RateLimitPlan {
            name: "test".to_string(),
            requests_per_window: requests,
            window_seconds: window,
        }
    }

    #[test]
    fn no_plan_admits_everything() {
        let limiter = RateLimiter::default();
        for _ in 0..100 {
            let admission = limiter.admit("1.2.3.4", None, 0);
            assert!(admission.allowed);
            assert_eq!(admission.limit, 0);
        }
    }

    #[test]
    fn denies_after_plan_exhausted_within_window() {
        let limiter = RateLimiter::default();
        let plan = plan(2, 60);

        let first = limiter.admit("1.2.3.4", Some(&plan), 100);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.admit("1.2.3.4", Some(&plan), 105);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.admit("1.2.3.4", Some(&plan), 110);
        assert!(!third.allowed);
        assert_eq!(third.limit, 2);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_seconds, 50);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::default();
        let plan = plan(1, 60);

        assert!(limiter.admit("1.2.3.4", Some(&plan), 100).allowed);
        assert!(!limiter.admit("1.2.3.4", Some(&plan), 159).allowed);
        assert!(limiter.admit("1.2.3.4", Some(&plan), 160).allowed);
    }

    #[test]
    fn ips_are_tracked_independently() {
        let limiter = RateLimiter::default();
        let plan = plan(1, 60);

        assert!(limiter.admit("1.2.3.4", Some(&plan), 0).allowed);
        assert!(limiter.admit("5.6.7.8", Some(&plan), 0).allowed);
        assert!(!limiter.admit("1.2.3.4", Some(&plan), 1).allowed);
    }

    #[test]
    fn clear_drops_all_windows() {
        let limiter = RateLimiter::default();
        let plan = plan(1, 60);

        assert!(limiter.admit("1.2.3.4", Some(&plan), 0).allowed);
        assert!(!limiter.admit("1.2.3.4", Some(&plan), 1).allowed);
        limiter.clear();
        assert!(limiter.admit("1.2.3.4", Some(&plan), 2).allowed);
    }

    #[test]
    fn plan_validation() {
        assert!(plan(1, 60).validate().is_ok());
        assert!(plan(0, 60).validate().is_err());
        assert!(plan(1, 0).validate().is_err());
    }
}
