use std::time::Duration;

use tokio::time::Instant;

/// Shapes a byte-progress stream into sleep decisions.
///
/// The rate is a signed knob: positive is a bytes-per-second ceiling,
/// a value in (-100, 0) throttles to `|rate|` percent of uncapped
/// throughput, and `0` or anything at or below `-100` disables shaping.
#[derive(Debug)]
pub struct Limiter {
    last_tick: Instant,
    last_bytes: u64,
}

impl Limiter {
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
            last_bytes: 0,
        }
    }

    /// Resets the sampling window at the start of a transfer.
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
        self.last_bytes = 0;
    }

    /// Called after each progress sample with the cumulative byte count.
    pub async fn throttle(&mut self, transferred: u64, rate: i64) {
        if rate > 0 {
            let elapsed_us = self.last_tick.elapsed().as_micros();
            let delta = transferred.saturating_sub(self.last_bytes) as u128;
            if delta > 0 && elapsed_us > 0 && 1_000_000 * delta / elapsed_us > rate as u128 {
                let nominal_us = 1_000_000 * delta / rate as u128;
                if nominal_us > elapsed_us {
                    tokio::time::sleep(Duration::from_micros((nominal_us - elapsed_us) as u64))
                        .await;
                }
            }
            self.last_bytes = transferred;
            self.last_tick = Instant::now();
        } else if rate < 0 && rate > -100 {
            let elapsed_us = self.last_tick.elapsed().as_micros() as f64;
            // |rate| is the percentage of bandwidth to use.
            let wait_us = -elapsed_us * (1.0 + 100.0 / rate as f64);
            if wait_us > 0.0 {
                tokio::time::sleep(Duration::from_micros(wait_us as u64)).await;
            }
            self.last_tick = Instant::now();
        }
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_rate_sleeps_toward_total_bytes_over_limit() {
        let mut limiter = Limiter::new();
        let start = Instant::now();
        // 10 samples of 1000 bytes arriving 1 ms apart, capped at 2000 B/s:
        // total elapsed should approach 10_000 / 2000 = 5 s.
        for sample in 1..=10u64 {
            tokio::time::advance(Duration::from_millis(1)).await;
            limiter.throttle(sample * 1000, 2000).await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(4900), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(5100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn percentage_mode_sleeps_a_fraction_of_the_interval() {
        let mut limiter = Limiter::new();
        tokio::time::advance(Duration::from_millis(100)).await;
        let start = Instant::now();
        // -50 means 50% throughput: a 100 ms interval earns a 100 ms sleep.
        limiter.throttle(1000, -50).await;
        let slept = start.elapsed();
        assert!(slept >= Duration::from_millis(99), "slept {slept:?}");
        assert!(slept <= Duration::from_millis(101), "slept {slept:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_and_full_negative_rates_do_not_sleep() {
        let mut limiter = Limiter::new();
        let start = Instant::now();
        limiter.throttle(1_000_000, 0).await;
        limiter.throttle(2_000_000, -100).await;
        limiter.throttle(3_000_000, -250).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn under_the_limit_does_not_sleep() {
        let mut limiter = Limiter::new();
        tokio::time::advance(Duration::from_secs(1)).await;
        let start = Instant::now();
        // 500 bytes over a full second is below the 2000 B/s cap.
        limiter.throttle(500, 2000).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
