//! Humanized inter-request delays.

use rand::Rng;
use std::time::Duration;

/// Compute a human-looking delay.
///
/// Uniform in `[min_ms, max_ms]` plus triangular jitter in `±jitter_ms`
/// (the sum of two uniforms, which peaks at zero), clamped below at
/// `min_ms`.
#[must_use]
pub fn human_delay(min_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let mut rng = rand::thread_rng();

    let base = if max_ms > min_ms {
        rng.gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };

    let jitter = if jitter_ms > 0 {
        let j = jitter_ms as i64;
        (rng.gen_range(-j..=j) + rng.gen_range(-j..=j)) / 2
    } else {
        0
    };

    let delayed = (base as i64 + jitter).max(min_ms as i64);
    Duration::from_millis(delayed.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_bounds() {
        for _ in 0..200 {
            let d = human_delay(100, 300, 50);
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(350));
        }
    }

    #[test]
    fn test_never_below_min() {
        for _ in 0..200 {
            let d = human_delay(100, 100, 500);
            assert!(d >= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_zero_jitter_is_uniform() {
        for _ in 0..50 {
            let d = human_delay(10, 20, 0);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }
}
