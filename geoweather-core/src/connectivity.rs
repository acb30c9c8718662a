//! "Is there a network path?" check run before a provider request.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::Url;
use tokio::net::TcpStream;

#[async_trait]
pub trait Connectivity: Send + Sync + Debug {
    async fn is_online(&self) -> bool;
}

/// Skips the check entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

#[async_trait]
impl Connectivity for AssumeOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Considers the network available when a TCP connection to `host:port`
/// can be opened within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host serving `url`. Returns `None` when the URL has no host.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        let port = parsed.port_or_known_default()?;
        Some(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(
                    host = %self.host,
                    port = self.port,
                    error = %e,
                    "Connectivity probe failed"
                );
                false
            }
            Err(_) => {
                tracing::debug!(
                    host = %self.host,
                    port = self.port,
                    "Connectivity probe timed out"
                );
                false
            }
        }
    }
}
