use tokio::time::Instant;

/// Messages per second a connection may sustain
pub const MESSAGES_PER_SECOND: f64 = 10.0;
/// Messages a connection may send in one burst
pub const MESSAGE_BURST: f64 = 20.0;

/// Token bucket rate limiter for WebSocket connections.
///
/// Allows `rate` messages per second with a burst capacity of `burst`.
/// Uses the tokio clock so paused-time tests can drive refills.
pub struct RateLimiter {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MESSAGES_PER_SECOND, MESSAGE_BURST)
    }
}

impl RateLimiter {
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            tokens: burst,
            max_tokens: burst,
            refill_rate: rate,
            last_refill: Instant::now(),
        }
    }

    /// Takes a token if one is available.
    pub fn allow(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_limited() {
        let mut rl = RateLimiter::default();
        for _ in 0..20 {
            assert!(rl.allow());
        }
        assert!(!rl.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        let mut rl = RateLimiter::new(10.0, 5.0);
        while rl.allow() {}

        // 100ms at 10/sec = 1 token
        tokio::time::advance(Duration::from_millis(120)).await;
        assert!(rl.allow());
        assert!(!rl.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_exceed_burst() {
        let mut rl = RateLimiter::new(10.0, 5.0);
        tokio::time::advance(Duration::from_secs(10)).await;
        let mut count = 0;
        while rl.allow() && count < 100 {
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
