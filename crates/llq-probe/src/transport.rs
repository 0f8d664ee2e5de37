// crates/llq-probe/src/transport.rs
//
// ProbeTransport: the seam between the prober and the actual network.
//
// The production implementation opens a TCP connection to the member's
// registered endpoint. Tests substitute an in-memory transport (llq-sim).

use async_trait::async_trait;

use llq_core::QuorumError;

/// Opens a connection attempt to a member endpoint.
///
/// Implementations perform one connection attempt and return. The prober
/// owns the timeout; a transport must not retry internally.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Attempt to reach `endpoint` ("host:port"). `Ok(())` means the
    /// endpoint accepted a connection.
    async fn connect(&self, endpoint: &str) -> Result<(), QuorumError>;
}

/// Production transport: a plain TCP connect to the member's endpoint.
#[derive(Debug, Clone, Default)]
pub struct TcpProbeTransport;

#[async_trait]
impl ProbeTransport for TcpProbeTransport {
    async fn connect(&self, endpoint: &str) -> Result<(), QuorumError> {
        match tokio::net::TcpStream::connect(endpoint).await {
            Ok(_stream) => Ok(()),
            Err(e) => Err(QuorumError::Network(format!(
                "connect to {} failed: {}",
                endpoint, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_transport_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpProbeTransport;
        let result = transport.connect(&addr.to_string()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_transport_fails_on_closed_port() {
        // Bind and drop to get a port that is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpProbeTransport;
        let result = transport.connect(&addr.to_string()).await;
        assert!(result.is_err());
    }
}
