use crate::error::{Error, ErrorKind, Result};
use crate::gate::ConnectivityGate;
use crate::limiter::RateLimiter;
use crate::signals::Signals;
use crate::transport::Transport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

/// Fetches a page, however long it takes.
///
/// Every attempt waits for connectivity, then for its turn at the shared
/// [`RateLimiter`], then makes the request. Failed attempts are reported and
/// retried with the same sequence indefinitely; the rate-limit interval is
/// the only backoff. The only way out other than success is cancellation.
#[derive(Clone)]
pub struct PatientFetcher {
    gate: ConnectivityGate,
    limiter: Arc<RateLimiter>,
    transport: Arc<dyn Transport>,
    signals: Arc<dyn Signals>,
}

impl PatientFetcher {
    pub fn new(
        gate: ConnectivityGate,
        limiter: Arc<RateLimiter>,
        transport: Arc<dyn Transport>,
        signals: Arc<dyn Signals>,
    ) -> Self {
        Self { gate, limiter, transport, signals }
    }

    pub fn signals(&self) -> &Arc<dyn Signals> {
        &self.signals
    }

    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<String> {
        self.fetch_with(url, cancel, |_| {}).await
    }

    /// As [`fetch`](Self::fetch), additionally calling `on_error` with every
    /// failed attempt before it is retried.
    #[instrument(skip_all, fields(%url, attempts))]
    pub async fn fetch_with<F>(&self, url: &Url, cancel: &CancellationToken, mut on_error: F) -> Result<String>
    where
        F: FnMut(&Error) + Send,
    {
        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            attempts += 1;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
                outcome = self.attempt(url) => outcome,
            };
            match outcome {
                Ok(body) => {
                    tracing::Span::current().record("attempts", attempts);
                    if attempts > 1 {
                        self.signals.fetch_recovered(url);
                    }
                    return Ok(body);
                },
                Err(err) => {
                    on_error(&err);
                    self.signals.fetch_failed(url, &err);
                },
            }
        }
    }

    async fn attempt(&self, url: &Url) -> Result<String> {
        self.gate.suspend_until_usable(self.signals.as_ref()).await;
        self.limiter.throttle(self.transport.get(url)).await
    }
}

impl std::fmt::Debug for PatientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientFetcher")
            .field("gate", &self.gate)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{AlwaysOnline, ManualProbe};
    use crate::test::RecordingSignals;
    use crate::transport::MockTransport;
    use rstest::rstest;
    use std::time::Duration;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_millis(300);

    fn url(path: &str) -> Url {
        Url::parse("https://fiction.test/").unwrap().join(path).unwrap()
    }

    fn fetcher(transport: &Arc<MockTransport>, signals: &Arc<RecordingSignals>) -> PatientFetcher {
        let gate = ConnectivityGate::new(Arc::new(AlwaysOnline), Duration::from_millis(500));
        PatientFetcher::new(gate, Arc::new(RateLimiter::new(INTERVAL)), transport.clone(), signals.clone())
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(7)]
    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success(#[case] failures: usize) {
        let page = url("/s/42/1/");
        let transport = Arc::new(MockTransport::new());
        transport.serve(&page, "<html>ok</html>").fail(&page, std::iter::repeat_n(503, failures));
        let signals = Arc::new(RecordingSignals::default());
        let fetcher = fetcher(&transport, &signals);

        let mut seen = Vec::new();
        let start = Instant::now();
        let body = fetcher
            .fetch_with(&page, &CancellationToken::new(), |err| seen.push((**err).clone()))
            .await
            .unwrap();

        assert_eq!(body, "<html>ok</html>");
        assert_eq!(seen, vec![ErrorKind::Status(503); failures]);
        assert_eq!(transport.request_count(&page), failures + 1);
        assert_eq!(signals.failed(), failures);
        assert_eq!(signals.recovered(), usize::from(failures > 0));
        // Every attempt, failed or not, waits the same interval.
        assert_eq!(start.elapsed(), INTERVAL * (failures as u32 + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_the_loop() {
        let page = url("/s/1/1/");
        let transport = Arc::new(MockTransport::new());
        let signals = Arc::new(RecordingSignals::default());
        let fetcher = fetcher(&transport, &signals);
        let cancel = CancellationToken::new();

        let mut failures = 0;
        let err = fetcher
            .fetch_with(&page, &cancel, |_| {
                failures += 1;
                if failures == 3 {
                    cancel.cancel();
                }
            })
            .await
            .unwrap_err();
        assert_eq!(*err, ErrorKind::Cancelled);
        assert_eq!(transport.request_count(&page), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_waiting_for_network() {
        let probe = ManualProbe::new(false);
        let gate = ConnectivityGate::new(Arc::new(probe), Duration::from_millis(500));
        let transport = Arc::new(MockTransport::new());
        let signals = Arc::new(RecordingSignals::default());
        let fetcher =
            PatientFetcher::new(gate, Arc::new(RateLimiter::new(INTERVAL)), transport.clone(), signals.clone());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let err = fetcher.fetch(&url("/s/1/1/"), &cancel).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Cancelled);
        assert!(transport.requests().is_empty());
        assert_eq!(signals.waiting(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_share_one_limit() {
        let transport = Arc::new(MockTransport::new());
        for chapter in 1..=3 {
            transport.serve(&url(&format!("/s/9/{chapter}/")), format!("chapter {chapter}"));
        }
        let signals = Arc::new(RecordingSignals::default());
        let fetcher = fetcher(&transport, &signals);

        let tasks = (1..=3)
            .map(|chapter| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move { fetcher.fetch(&url(&format!("/s/9/{chapter}/")), &CancellationToken::new()).await })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let times = transport.request_times();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= INTERVAL);
        }
    }
}
