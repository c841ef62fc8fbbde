//! Truncated exponential backoff with multiplicative jitter

use std::time::Duration;

use rand::Rng;

/// Smallest delay produced when the initial delay is non-zero
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Backoff state for one logical operation
///
/// `delay(n) = min(max, initial * multiplier^n) * uniform(1 - jitter, 1 + jitter)`,
/// truncated again to `max`. Each operation builds its own instance from a
/// [`RetryConfig`](crate::retry::RetryConfig), so jitter state is never shared.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    maximum: Duration,
    multiplier: f64,
    jitter: f64,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, maximum: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            maximum: maximum.max(initial),
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 0.99),
            attempts: 0,
        }
    }

    /// Number of delays handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempts.min(i32::MAX as u32) as i32;
        self.attempts = self.attempts.saturating_add(1);

        let max_secs = self.maximum.as_secs_f64();
        let base = (self.initial.as_secs_f64() * self.multiplier.powi(exponent)).min(max_secs);

        let factor = if self.jitter > 0.0 {
            rand::rng().random_range((1.0 - self.jitter)..=(1.0 + self.jitter))
        } else {
            1.0
        };

        let delay = Duration::from_secs_f64((base * factor).clamp(0.0, max_secs));
        if self.initial.is_zero() {
            delay
        } else {
            delay.max(MIN_DELAY.min(self.maximum))
        }
    }

    /// Start over, as for a new logical operation
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_without_jitter() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
            0.0,
        );

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
        // Truncated from here on
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_jitter_bounds() {
        let max = Duration::from_millis(1500);
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), max, 2.0, 0.5);

        let mut previous_base = 0.0;
        for n in 0..20 {
            let delay = backoff.next_delay();
            let base = (100.0 * 2f64.powi(n)).min(1500.0);
            assert!(delay <= max, "attempt {n}: {delay:?} exceeds {max:?}");
            assert!(delay > Duration::ZERO);
            assert!(
                delay.as_secs_f64() * 1000.0 >= base * 0.5 - 1e-6,
                "attempt {n}: {delay:?} below jitter floor"
            );
            assert!(base >= previous_base);
            previous_base = base;
        }
    }

    #[test]
    fn test_non_decreasing_in_expectation() {
        let mut means = Vec::new();
        for n in 0..6 {
            let mut total = 0.0;
            for _ in 0..200 {
                let mut backoff = ExponentialBackoff::new(
                    Duration::from_millis(10),
                    Duration::from_millis(200),
                    2.0,
                    0.2,
                );
                for _ in 0..n {
                    backoff.next_delay();
                }
                total += backoff.next_delay().as_secs_f64();
            }
            means.push(total / 200.0);
        }

        // Bases are 10, 20, 40, 80, 160 and 200 (capped) milliseconds.
        for pair in means.windows(2) {
            assert!(pair[1] >= pair[0] * 0.95, "{means:?}");
        }
    }

    #[test]
    fn test_never_zero() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_micros(10),
            Duration::from_secs(1),
            1.0,
            0.9,
        );
        for _ in 0..100 {
            assert!(backoff.next_delay() > Duration::ZERO);
        }
    }

    #[test]
    fn test_reset() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1), 3.0, 0.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }
}
