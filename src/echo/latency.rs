//! Artificial latency: a fixed delay plus bounded random jitter.

use std::time::Duration;

/// Draw a jitter in `[0, max_jitter_ms)` milliseconds from a freshly seeded
/// generator.
pub fn jitter(max_jitter_ms: u64) -> Duration {
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let mut rng = fastrand::Rng::new();
    let millis = (rng.f64() * max_jitter_ms as f64) as u64;
    Duration::from_millis(millis)
}

/// Suspend the current request for `delay_ms` plus a random jitter.
///
/// Zero values skip the corresponding sleep entirely. Returns the total time
/// requested.
pub async fn inject(delay_ms: u64, max_jitter_ms: u64) -> Duration {
    let mut total = Duration::ZERO;

    if delay_ms != 0 {
        let delay = Duration::from_millis(delay_ms);
        tracing::debug!(delay_ms, "Adding delay");
        tokio::time::sleep(delay).await;
        total += delay;
    }

    if max_jitter_ms != 0 {
        let jitter = jitter(max_jitter_ms);
        tracing::debug!(max_jitter_ms, jitter_ms = jitter.as_millis() as u64, "Adding jitter");
        if !jitter.is_zero() {
            tokio::time::sleep(jitter).await;
        }
        total += jitter;
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn jitter_stays_below_bound() {
        for _ in 0..500 {
            assert!(jitter(25) < Duration::from_millis(25));
        }
        assert_eq!(jitter(0), Duration::ZERO);
    }

    #[tokio::test]
    async fn zero_values_do_not_sleep() {
        let start = Instant::now();
        assert_eq!(inject(0, 0).await, Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_and_jitter_add_up() {
        let start = tokio::time::Instant::now();
        let total = inject(100, 50).await;

        assert!(total >= Duration::from_millis(100));
        assert!(total < Duration::from_millis(150));
        assert!(start.elapsed() >= total);
    }
}
