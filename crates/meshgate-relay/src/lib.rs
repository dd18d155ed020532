//! Loopback TCP relay that tunnels every accepted connection through a
//! SOCKS5 proxy.
//!
//! One relay process runs per database bridge. It listens on
//! `127.0.0.1:{listen_port}`, accepts connections without a concurrency
//! ceiling unless one is configured, and hands each connection to its own
//! thread which performs a SOCKS5 `CONNECT` to the remote host before
//! splicing bytes in both directions.

mod args;
mod errors;
mod handler;
mod listener;
mod pump;
mod socks;

use std::sync::Arc;

pub use args::RelayArgs;
pub use errors::{ListenerError, RelayError, SocksError};
pub use handler::{ConnectionHandler, SocksForwarder};
pub use listener::{ListenerHandle, RelayListener};
pub use pump::Transfer;
pub use socks::{TargetAddr, connect};

/// Binds the relay described by `args` and starts accepting connections.
///
/// # Errors
///
/// Returns [`RelayError`] when the proxy endpoint is not a TCP endpoint, the
/// target cannot be encoded for SOCKS5, or the listen port cannot be bound.
pub fn start_relay(args: &RelayArgs) -> Result<ListenerHandle, RelayError> {
    if args.proxy.tcp_address().is_none() {
        return Err(RelayError::UnsupportedProxy {
            endpoint: args.proxy.to_string(),
        });
    }
    let target = TargetAddr::new(&args.target_host, args.target_port)?;
    let listener = RelayListener::bind(&args.listen_host, args.listen_port)?;
    let forwarder = Arc::new(SocksForwarder::new(args.proxy.clone(), target));
    let handle = listener.start(forwarder, args.max_connections)?;
    Ok(handle)
}
