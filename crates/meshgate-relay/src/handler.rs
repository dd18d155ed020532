//! Connection handling for the relay listener.

use std::net::TcpStream;
use std::time::Duration;

use meshgate_config::SocketEndpoint;
use tracing::{debug, warn};

use crate::listener::LISTENER_TARGET;
use crate::pump;
use crate::socks::{self, TargetAddr};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handles accepted relay connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Tunnels each connection to a fixed target through a SOCKS5 proxy.
#[derive(Debug, Clone)]
pub struct SocksForwarder {
    proxy: SocketEndpoint,
    target: TargetAddr,
}

impl SocksForwarder {
    /// Builds a forwarder for `target` through `proxy`.
    #[must_use]
    pub const fn new(proxy: SocketEndpoint, target: TargetAddr) -> Self {
        Self { proxy, target }
    }
}

impl ConnectionHandler for SocksForwarder {
    fn handle(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        let upstream = match socks::connect(&self.proxy, &self.target, HANDSHAKE_TIMEOUT) {
            Ok(upstream) => upstream,
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    target_addr = %self.target,
                    error = %error,
                    "SOCKS5 connect failed; dropping connection"
                );
                return;
            }
        };
        match pump::splice(stream, upstream) {
            Ok(transfer) => debug!(
                target: LISTENER_TARGET,
                peer = %peer,
                sent = transfer.sent,
                received = transfer.received,
                "connection closed"
            ),
            Err(error) => debug!(
                target: LISTENER_TARGET,
                peer = %peer,
                error = %error,
                "connection ended with error"
            ),
        }
    }
}
