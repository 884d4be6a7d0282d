//! # Backoff between supervised restarts.
//!
//! The delay before restart `n` (0-based) is `first × factor^n`, capped at
//! `max`, then jittered. The base depends only on `n`, so jitter never feeds
//! back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use sagavisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(3), Duration::from_millis(800));
//! assert_eq!(backoff.next(4), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first restart.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth per restart (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied after capping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 500ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Un-jittered delay for restart `attempt` (0-based), capped at `max`.
    pub fn base(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        if secs.is_finite() && (0.0..=self.max.as_secs_f64()).contains(&secs) {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        }
    }

    /// Jittered delay for restart `attempt` (0-based).
    pub fn next(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.base(attempt), &mut rand::rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_geometrically_until_cap() {
        let p = policy(100, 1_000, 2.0);
        let delays: Vec<u128> = (0..6).map(|n| p.next(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn factor_one_is_constant() {
        let p = policy(250, 10_000, 1.0);
        assert!((0..20).all(|n| p.next(n) == Duration::from_millis(250)));
    }

    #[test]
    fn first_above_max_is_capped() {
        assert_eq!(policy(5_000, 1_000, 2.0).base(0), Duration::from_millis(1_000));
    }

    #[test]
    fn overflow_and_negative_factor_fall_back_to_max() {
        assert_eq!(policy(100, 60_000, 2.0).base(u32::MAX), Duration::from_secs(60));
        assert_eq!(policy(100, 60_000, -3.0).base(1), Duration::from_secs(60));
    }

    #[test]
    fn jittered_delay_never_exceeds_base() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..policy(100, 30_000, 2.0)
        };
        for attempt in 0..12 {
            assert!(p.next(attempt) <= p.base(attempt));
        }
    }
}
