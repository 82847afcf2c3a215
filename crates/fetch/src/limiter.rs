use std::time::Duration;
use tokio::sync::Mutex;

/// One request at a time, each preceded by a fixed wait, across every
/// caller sharing the limiter.
///
/// The lock is held through both the wait and the request, so concurrent
/// callers queue up behind each other instead of each sleeping on its own.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    lock: Mutex<()>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, lock: Mutex::new(()) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for our turn, wait the interval, then run `request`.
    pub async fn throttle<F, T>(&self, request: F) -> T
    where
        F: Future<Output = T>,
    {
        let _turn = self.lock.lock().await;
        tokio::time::sleep(self.interval).await;
        request.await
    }
}
