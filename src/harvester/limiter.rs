// Dispatch throttle: at most `limit` permits in any rolling period.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub struct RateLimiter {
    limit: usize,
    period: Duration,
    issued: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(limit: usize, period: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            period,
            issued: VecDeque::with_capacity(limit),
        }
    }

    pub fn per_second(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    /// Waits until a permit is available and takes it.
    pub async fn acquire(&mut self) {
        if self.issued.len() >= self.limit
            && let Some(oldest) = self.issued.pop_front()
        {
            tokio::time::sleep_until(oldest + self.period).await;
        }
        self.issued.push_back(Instant::now());
    }
}
