use crate::signals::Signals;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;

/// Answers whether a network path is currently usable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn is_usable(&self) -> bool;
}

/// Usable when a TCP connection to `address` can be opened within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self { address: address.into(), timeout }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn is_usable(&self) -> bool {
        matches!(tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await, Ok(Ok(_)))
    }
}

/// Never reports the network as unusable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

#[async_trait]
impl Probe for AlwaysOnline {
    async fn is_usable(&self) -> bool {
        true
    }
}

/// A probe flipped by hand; clones share the same switch.
#[derive(Debug, Clone)]
pub struct ManualProbe(Arc<AtomicBool>);

impl ManualProbe {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Probe for ManualProbe {
    async fn is_usable(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Holds callers back while the network is unusable.
#[derive(Clone)]
pub struct ConnectivityGate {
    probe: Arc<dyn Probe>,
    poll: Duration,
}

impl ConnectivityGate {
    pub fn new(probe: Arc<dyn Probe>, poll: Duration) -> Self {
        Self { probe, poll }
    }

    pub async fn is_usable(&self) -> bool {
        self.probe.is_usable().await
    }

    /// Return once the network is usable, re-probing every poll interval.
    /// Never fails; to give up, drop the future.
    pub async fn suspend_until_usable(&self, signals: &dyn Signals) {
        if self.probe.is_usable().await {
            return;
        }
        signals.waiting_for_network();
        loop {
            tokio::time::sleep(self.poll).await;
            if self.probe.is_usable().await {
                signals.network_restored();
                return;
            }
        }
    }
}

impl std::fmt::Debug for ConnectivityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityGate").field("poll", &self.poll).finish_non_exhaustive()
    }
}
