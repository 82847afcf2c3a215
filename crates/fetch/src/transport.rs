use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// A single attempt at retrieving a page. No retrying, no waiting.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The body of `url`, or an error for anything other than a success
    /// status.
    async fn get(&self, url: &Url) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip_all, fields(%url, status))]
    async fn get(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await.or_raise(|| ErrorKind::Transport)?;
        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        response.text().await.or_raise(|| ErrorKind::Transport)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockTransport;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tokio::time::Instant;

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serves canned pages by URL and records every request.
    ///
    /// Scripted failure statuses for a URL are returned first, one per
    /// request; after that the served page (if any) is returned every time.
    /// URLs with neither answer 404.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        pages: Mutex<HashMap<String, String>>,
        failures: Mutex<HashMap<String, VecDeque<u16>>>,
        requests: Mutex<Vec<(String, Instant)>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(&self, url: &Url, body: impl Into<String>) -> &Self {
            lock(&self.pages).insert(url.to_string(), body.into());
            self
        }

        pub fn fail(&self, url: &Url, statuses: impl IntoIterator<Item = u16>) -> &Self {
            lock(&self.failures).entry(url.to_string()).or_default().extend(statuses);
            self
        }

        /// Every requested URL, in request order.
        pub fn requests(&self) -> Vec<String> {
            lock(&self.requests).iter().map(|(url, _)| url.clone()).collect()
        }

        pub fn request_times(&self) -> Vec<Instant> {
            lock(&self.requests).iter().map(|(_, at)| *at).collect()
        }

        pub fn request_count(&self, url: &Url) -> usize {
            lock(&self.requests).iter().filter(|(requested, _)| requested == url.as_str()).count()
        }

        pub fn reset_requests(&self) {
            lock(&self.requests).clear();
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &Url) -> Result<String> {
            let key = url.to_string();
            lock(&self.requests).push((key.clone(), Instant::now()));
            if let Some(status) = lock(&self.failures).get_mut(&key).and_then(VecDeque::pop_front) {
                exn::bail!(ErrorKind::Status(status));
            }
            lock(&self.pages).get(&key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::Status(404)))
        }
    }
}
