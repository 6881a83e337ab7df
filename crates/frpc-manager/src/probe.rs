//! Reachability check for the configured frps server.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::debug;

use crate::config::ConfigDocument;

/// Default time allowed for resolving and connecting.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProbeResult {
    /// Whether a host and a valid port are configured at all.
    pub configured: bool,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionProbeResult {
    pub fn not_configured() -> Self {
        Self {
            configured: false,
            reachable: false,
            message: None,
        }
    }

    pub fn reachable() -> Self {
        Self {
            configured: true,
            reachable: true,
            message: None,
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            configured: true,
            reachable: false,
            message: Some(message.into()),
        }
    }

    /// The probe could not run at all.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            configured: false,
            reachable: false,
            message: Some(message.into()),
        }
    }
}

/// Probe the server named by `doc.common.server_addr` / `server_port`.
pub async fn probe_config(doc: &ConfigDocument, limit: Duration) -> ConnectionProbeResult {
    let host = doc.server_addr().unwrap_or_default();
    let port = doc.server_port().and_then(|value| value.as_port());
    probe(host, port, limit).await
}

/// Attempt a TCP connection to `host:port` within `limit`.
///
/// A blank host or missing port yields `configured: false` without touching
/// the network. The connection, if any, is dropped before returning.
pub async fn probe(host: &str, port: Option<u16>, limit: Duration) -> ConnectionProbeResult {
    let host = host.trim();
    let Some(port) = port.filter(|p| *p > 0) else {
        return ConnectionProbeResult::not_configured();
    };
    if host.is_empty() {
        return ConnectionProbeResult::not_configured();
    }

    let result = match timeout(limit, connect(host, port)).await {
        Ok(Ok(_stream)) => ConnectionProbeResult::reachable(),
        Ok(Err(failure)) => ConnectionProbeResult::unreachable(failure.message()),
        Err(_) => ConnectionProbeResult::unreachable(ProbeFailure::TimedOut.message()),
    };
    debug!(host, port, reachable = result.reachable, detail = ?result.message, "server probe finished");
    result
}

#[derive(Debug)]
enum ProbeFailure {
    HostNotFound,
    Refused,
    HostUnreachable,
    TimedOut,
    Other(io::Error),
}

impl ProbeFailure {
    fn message(&self) -> String {
        match self {
            Self::HostNotFound => "Host not found".to_string(),
            Self::Refused => "Connection refused".to_string(),
            Self::HostUnreachable => "Host unreachable".to_string(),
            Self::TimedOut => "Connection timed out".to_string(),
            Self::Other(e) => e.to_string(),
        }
    }

    fn classify(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::HostUnreachable
            }
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Other(err),
        }
    }
}

async fn connect(host: &str, port: u16) -> Result<TcpStream, ProbeFailure> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|_| ProbeFailure::HostNotFound)?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.map_or(ProbeFailure::HostNotFound, ProbeFailure::classify))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_blank_host_is_not_configured() {
        let result = probe("   ", Some(7000), DEFAULT_PROBE_TIMEOUT).await;
        assert_eq!(result, ConnectionProbeResult::not_configured());
    }

    #[tokio::test]
    async fn test_missing_port_is_not_configured() {
        let result = probe("127.0.0.1", None, DEFAULT_PROBE_TIMEOUT).await;
        assert!(!result.configured);
        let result = probe("127.0.0.1", Some(0), DEFAULT_PROBE_TIMEOUT).await;
        assert!(!result.configured);
    }

    #[tokio::test]
    async fn test_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = probe("127.0.0.1", Some(port), DEFAULT_PROBE_TIMEOUT).await;
        assert_eq!(result, ConnectionProbeResult::reachable());
    }

    #[tokio::test]
    async fn test_unbound_port_is_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let started = std::time::Instant::now();
        let result = probe("127.0.0.1", Some(port), DEFAULT_PROBE_TIMEOUT).await;
        assert!(started.elapsed() < DEFAULT_PROBE_TIMEOUT);
        assert!(result.configured);
        assert!(!result.reachable);
        assert_eq!(result.message.as_deref(), Some("Connection refused"));
    }

    #[tokio::test]
    async fn test_unknown_host() {
        let result = probe("host.invalid", Some(7000), DEFAULT_PROBE_TIMEOUT).await;
        assert!(result.configured);
        assert!(!result.reachable);
        assert!(result.message.is_some());
    }

    #[tokio::test]
    async fn test_probe_config_reads_common_section() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut doc = ConfigDocument::defaults();
        doc.common
            .insert("server_addr".to_string(), ConfigValue::from(" 127.0.0.1 "));
        doc.common
            .insert("server_port".to_string(), ConfigValue::from(port.to_string()));

        let result = probe_config(&doc, DEFAULT_PROBE_TIMEOUT).await;
        assert!(result.reachable);

        let unconfigured = probe_config(&ConfigDocument::defaults(), DEFAULT_PROBE_TIMEOUT).await;
        assert!(!unconfigured.configured);
    }

    #[test]
    fn test_message_serialization_is_optional() {
        let json = serde_json::to_value(ConnectionProbeResult::reachable()).unwrap();
        assert_eq!(json, serde_json::json!({ "configured": true, "reachable": true }));
    }
}
