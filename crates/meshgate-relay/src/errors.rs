//! Error types for the relay listener and SOCKS5 handshake.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the relay listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen host did not resolve.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Host that failed to resolve.
        host: String,
        /// Port paired with the host.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// The listen host resolved to nothing usable.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Host that resolved to nothing.
        host: String,
        /// Port paired with the host.
        port: u16,
    },
    /// The socket could not be created, bound or put into listening mode.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Address the relay tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Errors raised while negotiating a SOCKS5 `CONNECT`.
#[derive(Debug, Error)]
pub enum SocksError {
    /// The proxy is not a TCP endpoint.
    #[error("SOCKS5 proxy must be a TCP endpoint, got {endpoint}")]
    UnsupportedProxy {
        /// Rendered proxy endpoint.
        endpoint: String,
    },
    /// The proxy could not be reached.
    #[error("failed to connect to SOCKS5 proxy {endpoint}: {source}")]
    ProxyConnect {
        /// Rendered proxy endpoint.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The proxy answered with a protocol version other than 5.
    #[error("proxy answered with SOCKS version {version}")]
    UnsupportedVersion {
        /// Version byte received.
        version: u8,
    },
    /// The proxy refused the no-authentication method.
    #[error("proxy accepted none of the offered authentication methods")]
    NoAcceptableMethod,
    /// The proxy rejected the `CONNECT` request.
    #[error("proxy rejected CONNECT with code {code:#04x}: {reason}")]
    Rejected {
        /// Reply code sent by the proxy.
        code: u8,
        /// Human-readable meaning of the reply code.
        reason: &'static str,
    },
    /// The proxy replied with an unknown bound-address type.
    #[error("proxy replied with unknown address type {atyp:#04x}")]
    UnknownAddressType {
        /// Address type byte received.
        atyp: u8,
    },
    /// A domain target exceeds the 255 bytes SOCKS5 can carry.
    #[error("target host '{host}' is longer than 255 bytes")]
    DomainTooLong {
        /// Offending host name.
        host: String,
    },
    /// Reading from or writing to the proxy failed.
    #[error("SOCKS5 handshake failed: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while starting a relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The proxy is not a TCP endpoint.
    #[error("SOCKS5 proxy must be a TCP endpoint, got {endpoint}")]
    UnsupportedProxy {
        /// Rendered proxy endpoint.
        endpoint: String,
    },
    /// The target cannot be expressed as a SOCKS5 address.
    #[error(transparent)]
    Target(#[from] SocksError),
    /// The listener could not be started.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}
