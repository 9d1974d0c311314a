//! Pure exponential-backoff-with-jitter calculation, translated from
//! `CalculateRetryDelay` in the original Go implementation. No IO, no
//! randomness source beyond `fastrand`'s thread-local generator.

use crate::job::RetryPolicy;
use std::time::Duration;

/// Computes the delay before attempt `attempt` (1-based) given `policy`.
///
/// `attempt <= 0` returns zero. Otherwise the base delay is
/// `initial * 2^(attempt - 1)`, capped at `max_interval` when set, then
/// jittered by a uniformly random amount in `[0, base/2)` so the returned
/// delay falls in `[base, base + base/2)`.
pub fn calculate_retry_delay(attempt: i32, policy: &RetryPolicy) -> Duration {
    if attempt <= 0 {
        return Duration::ZERO;
    }

    let mut base = policy
        .initial_interval
        .saturating_mul(1u32.checked_shl((attempt - 1) as u32).unwrap_or(u32::MAX));

    if policy.max_interval > Duration::ZERO && base > policy.max_interval {
        base = policy.max_interval;
    }

    if base.is_zero() {
        return base;
    }

    let jitter_max_nanos = base.as_nanos() / 2;
    if jitter_max_nanos == 0 {
        return base;
    }

    let jitter_nanos = fastrand::u128(0..jitter_max_nanos);
    base + Duration::from_nanos(jitter_nanos.min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_secs: u64, max_secs: u64) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_secs(initial_secs),
            max_interval: Duration::from_secs(max_secs),
            max_attempts: 10,
        }
    }

    #[test]
    fn zero_or_negative_attempt_has_no_delay() {
        let p = policy(1, 10);
        assert_eq!(calculate_retry_delay(0, &p), Duration::ZERO);
        assert_eq!(calculate_retry_delay(-3, &p), Duration::ZERO);
    }

    #[test]
    fn first_attempt_is_around_one_second() {
        let p = policy(1, 10);
        let delay = calculate_retry_delay(1, &p);
        assert!(delay >= Duration::from_secs(1));
        assert!(delay < Duration::from_millis(1500));
    }

    #[test]
    fn third_attempt_quadruples_the_base() {
        let p = policy(1, 10);
        let delay = calculate_retry_delay(3, &p);
        assert!(delay >= Duration::from_secs(4));
        assert!(delay < Duration::from_secs(6));
    }

    #[test]
    fn tenth_attempt_is_capped_by_max_interval() {
        let p = policy(1, 10);
        let delay = calculate_retry_delay(10, &p);
        assert!(delay >= Duration::from_secs(10));
        assert!(delay < Duration::from_secs(15));
    }

    #[test]
    fn zero_max_interval_disables_the_cap() {
        let p = RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::ZERO,
            max_attempts: 10,
        };
        let delay = calculate_retry_delay(20, &p);
        assert!(delay > Duration::from_secs(1));
    }
}
