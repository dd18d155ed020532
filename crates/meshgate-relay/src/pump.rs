//! Bidirectional byte copying between a client and its upstream.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::thread;

use tracing::trace;

use crate::listener::LISTENER_TARGET;

/// Bytes moved in each direction over one relayed connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes copied from the client to the upstream.
    pub sent: u64,
    /// Bytes copied from the upstream to the client.
    pub received: u64,
}

/// Copies bytes both ways until each side has closed its write half.
///
/// End-of-stream on one side is forwarded as a write shutdown on the other,
/// so half-closed protocols keep working.
pub(crate) fn splice(client: TcpStream, upstream: TcpStream) -> io::Result<Transfer> {
    let client_reader = client.try_clone()?;
    let upstream_writer = upstream.try_clone()?;
    let outbound = thread::spawn(move || copy_half(client_reader, upstream_writer));
    let inbound = copy_half(upstream, client);
    let sent = outbound
        .join()
        .map_err(|_| io::Error::other("outbound copy thread panicked"))??;
    Ok(Transfer {
        sent,
        received: inbound?,
    })
}

fn copy_half(mut from: TcpStream, mut to: TcpStream) -> io::Result<u64> {
    let copied = io::copy(&mut from, &mut to);
    if let Err(error) = to.shutdown(Shutdown::Write)
        && error.kind() != io::ErrorKind::NotConnected
    {
        trace!(target: LISTENER_TARGET, error = %error, "write shutdown failed");
    }
    copied
}
