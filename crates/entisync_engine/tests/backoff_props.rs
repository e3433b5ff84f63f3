//! Property tests for retry delay bounds.

use entisync_engine::RetryConfig;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn default_delays_stay_within_bounds(attempt in 1u32..64, jitter in 0.5f64..=1.0) {
        let config = RetryConfig::default();
        let delay = config.delay_for_attempt(attempt, jitter);

        prop_assert!(delay >= Duration::from_millis(250));
        prop_assert!(delay <= Duration::from_secs(10));
    }

    #[test]
    fn first_retry_waits_half_to_full_base(jitter in 0.5f64..=1.0) {
        let config = RetryConfig::default();
        let delay = config.delay_for_attempt(1, jitter);

        prop_assert!(delay >= Duration::from_millis(250));
        prop_assert!(delay <= Duration::from_millis(500));
    }

    #[test]
    fn expected_delay_never_shrinks(attempt in 1u32..63) {
        let config = RetryConfig::default();
        let current = config.delay_for_attempt(attempt, 0.75);
        let next = config.delay_for_attempt(attempt + 1, 0.75);

        prop_assert!(next >= current);
    }

    #[test]
    fn out_of_range_jitter_is_clamped(attempt in 1u32..8, jitter in -4.0f64..4.0) {
        let config = RetryConfig::default();
        let delay = config.delay_for_attempt(attempt, jitter);

        prop_assert!(delay >= config.delay_for_attempt(attempt, 0.5));
        prop_assert!(delay <= config.delay_for_attempt(attempt, 1.0));
    }

    #[test]
    fn flat_delays_ignore_attempt(attempt in 1u32..64) {
        let config = RetryConfig::default().with_backoff(false);

        prop_assert_eq!(
            config.delay_for_attempt(attempt, 1.0),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn sampled_delays_stay_within_bounds(attempt in 1u32..16) {
        let config = RetryConfig::default();
        let delay = config.sample_delay(attempt);

        prop_assert!(delay >= config.delay_for_attempt(attempt, 0.5));
        prop_assert!(delay <= config.delay_for_attempt(attempt, 1.0));
    }
}
