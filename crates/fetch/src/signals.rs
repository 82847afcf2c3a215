use crate::error::Error;
use url::Url;

/// Receives the user-visible side effects of fetching: waiting for the
/// network, failing, and recovering.
///
/// Implementations must return quickly; they are called inline from the
/// fetch loop.
pub trait Signals: Send + Sync {
    /// Connectivity is unusable and fetching is suspended until it returns.
    fn waiting_for_network(&self);
    /// Connectivity came back after [`waiting_for_network`](Self::waiting_for_network).
    fn network_restored(&self);
    /// An attempt failed and will be retried.
    fn fetch_failed(&self, url: &Url, error: &Error);
    /// A fetch succeeded after at least one failed attempt. Clears whatever
    /// [`fetch_failed`](Self::fetch_failed) showed.
    fn fetch_recovered(&self, url: &Url);
}

/// Reports every signal to the log and nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSignals;

impl Signals for TracingSignals {
    fn waiting_for_network(&self) {
        tracing::warn!("waiting for network");
    }

    fn network_restored(&self) {
        tracing::info!("network restored");
    }

    fn fetch_failed(&self, url: &Url, error: &Error) {
        tracing::warn!(%url, error = ?error, "fetch failed, retrying");
    }

    fn fetch_recovered(&self, url: &Url) {
        tracing::info!(%url, "fetch recovered");
    }
}
