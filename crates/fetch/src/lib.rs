//! Fetching from a scrape-only remote that rate-limits and goes away.
//!
//! [`PatientFetcher`] combines a [`ConnectivityGate`], a process-wide
//! [`RateLimiter`] and a [`Transport`] into a fetch that only returns on
//! success or cancellation.

pub mod error;
mod fetcher;
mod gate;
mod limiter;
mod signals;
mod transport;

pub use crate::fetcher::PatientFetcher;
pub use crate::gate::{AlwaysOnline, ConnectivityGate, ManualProbe, Probe, TcpProbe};
pub use crate::limiter::RateLimiter;
pub use crate::signals::{Signals, TracingSignals};
#[cfg(any(test, feature = "mock"))]
pub use crate::transport::MockTransport;
pub use crate::transport::{HttpTransport, Transport};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
