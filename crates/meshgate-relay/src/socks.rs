//! Client side of the SOCKS5 `CONNECT` handshake (RFC 1928, no auth).

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use meshgate_config::SocketEndpoint;

use crate::errors::SocksError;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const RESERVED: u8 = 0x00;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const REPLY_SUCCEEDED: u8 = 0x00;

/// Destination carried in a SOCKS5 `CONNECT` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// Literal IPv4 or IPv6 destination.
    Ip(SocketAddr),
    /// Host name resolved by the proxy.
    Domain {
        /// Host name, at most 255 bytes.
        host: String,
        /// Destination port.
        port: u16,
    },
}

impl TargetAddr {
    /// Builds a target, keeping IP literals as addresses so the proxy does
    /// not need to resolve them.
    ///
    /// # Errors
    ///
    /// Returns [`SocksError::DomainTooLong`] when a host name exceeds 255
    /// bytes.
    pub fn new(host: &str, port: u16) -> Result<Self, SocksError> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return Ok(Self::Ip(SocketAddr::new(ip, port)));
        }
        if u8::try_from(host.len()).is_err() {
            return Err(SocksError::DomainTooLong {
                host: host.to_owned(),
            });
        }
        Ok(Self::Domain {
            host: host.to_owned(),
            port,
        })
    }

    fn encode_into(&self, request: &mut Vec<u8>) -> Result<(), SocksError> {
        match self {
            Self::Ip(SocketAddr::V4(addr)) => {
                request.push(ATYP_IPV4);
                request.extend_from_slice(&addr.ip().octets());
                request.extend_from_slice(&addr.port().to_be_bytes());
            }
            Self::Ip(SocketAddr::V6(addr)) => {
                request.push(ATYP_IPV6);
                request.extend_from_slice(&addr.ip().octets());
                request.extend_from_slice(&addr.port().to_be_bytes());
            }
            Self::Domain { host, port } => {
                let length = u8::try_from(host.len())
                    .map_err(|_| SocksError::DomainTooLong { host: host.clone() })?;
                request.push(ATYP_DOMAIN);
                request.push(length);
                request.extend_from_slice(host.as_bytes());
                request.extend_from_slice(&port.to_be_bytes());
            }
        }
        Ok(())
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(addr) => write!(formatter, "{addr}"),
            Self::Domain { host, port } => write!(formatter, "{host}:{port}"),
        }
    }
}

/// Opens a tunnel to `target` through the SOCKS5 proxy at `proxy`.
///
/// `timeout` bounds connecting to the proxy and each handshake read or
/// write. The returned stream has no timeouts set.
///
/// # Errors
///
/// Returns [`SocksError`] when the proxy is unreachable, speaks another
/// protocol, or refuses the request.
pub fn connect(
    proxy: &SocketEndpoint,
    target: &TargetAddr,
    timeout: Duration,
) -> Result<TcpStream, SocksError> {
    let Some((host, port)) = proxy.tcp_address() else {
        return Err(SocksError::UnsupportedProxy {
            endpoint: proxy.to_string(),
        });
    };
    let mut stream = connect_proxy(host, port, timeout).map_err(|source| {
        SocksError::ProxyConnect {
            endpoint: proxy.to_string(),
            source,
        }
    })?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    negotiate(&mut stream, target)?;
    stream.set_read_timeout(None)?;
    stream.set_write_timeout(None)?;
    Ok(stream)
}

fn connect_proxy(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "proxy host resolved to no addresses")
    }))
}

/// Runs the greeting and `CONNECT` exchange over an established stream.
pub(crate) fn negotiate<S: Read + Write>(
    stream: &mut S,
    target: &TargetAddr,
) -> Result<(), SocksError> {
    stream.write_all(&[VERSION, 1, METHOD_NO_AUTH])?;
    let mut choice = [0_u8; 2];
    stream.read_exact(&mut choice)?;
    let [version, method] = choice;
    if version != VERSION {
        return Err(SocksError::UnsupportedVersion { version });
    }
    if method != METHOD_NO_AUTH {
        return Err(SocksError::NoAcceptableMethod);
    }

    let mut request = vec![VERSION, CMD_CONNECT, RESERVED];
    target.encode_into(&mut request)?;
    stream.write_all(&request)?;
    stream.flush()?;

    let mut header = [0_u8; 4];
    stream.read_exact(&mut header)?;
    let [reply_version, code, _reserved, atyp] = header;
    if reply_version != VERSION {
        return Err(SocksError::UnsupportedVersion {
            version: reply_version,
        });
    }
    if code != REPLY_SUCCEEDED {
        return Err(SocksError::Rejected {
            code,
            reason: reply_reason(code),
        });
    }
    skip_bound_address(stream, atyp)
}

fn skip_bound_address<S: Read>(stream: &mut S, atyp: u8) -> Result<(), SocksError> {
    let address_len = match atyp {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut length = [0_u8; 1];
            stream.read_exact(&mut length)?;
            let [length] = length;
            usize::from(length)
        }
        other => return Err(SocksError::UnknownAddressType { atyp: other }),
    };
    let mut bound = vec![0_u8; address_len + 2];
    stream.read_exact(&mut bound)?;
    Ok(())
}

const fn reply_reason(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    /// Replays canned proxy bytes and records what the client wrote.
    struct ScriptedProxy {
        replies: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ScriptedProxy {
        fn new(replies: &[u8]) -> Self {
            Self {
                replies: Cursor::new(replies.to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedProxy {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for ScriptedProxy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const ACCEPT_NO_AUTH: [u8; 2] = [0x05, 0x00];
    const SUCCESS_V4: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x04, 0x1F];

    #[test]
    fn ipv4_targets_are_sent_as_addresses() {
        let mut proxy = ScriptedProxy::new(&[ACCEPT_NO_AUTH.as_slice(), &SUCCESS_V4].concat());
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");

        negotiate(&mut proxy, &target).expect("handshake succeeds");

        assert_eq!(
            proxy.written,
            [
                0x05, 0x01, 0x00, // greeting
                0x05, 0x01, 0x00, 0x01, 10, 0, 0, 5, 0x05, 0x99,
            ]
        );
    }

    #[test]
    fn host_names_are_sent_as_domains() {
        let mut proxy = ScriptedProxy::new(&[ACCEPT_NO_AUTH.as_slice(), &SUCCESS_V4].concat());
        let target = TargetAddr::new("db", 5432).expect("target");

        negotiate(&mut proxy, &target).expect("handshake succeeds");

        assert_eq!(
            proxy.written.get(3..),
            Some([0x05, 0x01, 0x00, 0x03, 2, b'd', b'b', 0x15, 0x38].as_slice())
        );
    }

    #[test]
    fn domain_bound_addresses_are_consumed() {
        let reply = [0x05, 0x00, 0x00, 0x03, 3, b'a', b'b', b'c', 0x00, 0x50, 0xAA];
        let mut proxy = ScriptedProxy::new(&[ACCEPT_NO_AUTH.as_slice(), &reply].concat());
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");

        negotiate(&mut proxy, &target).expect("handshake succeeds");

        let mut rest = Vec::new();
        proxy.replies.read_to_end(&mut rest).expect("read rest");
        assert_eq!(rest, [0xAA], "payload after the reply must be untouched");
    }

    #[rstest]
    #[case(0x01, "general failure")]
    #[case(0x04, "host unreachable")]
    #[case(0x05, "connection refused")]
    #[case(0x42, "unknown error")]
    fn rejected_connects_carry_the_reply_reason(#[case] code: u8, #[case] expected: &str) {
        let reply = [0x05, code, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        let mut proxy = ScriptedProxy::new(&[ACCEPT_NO_AUTH.as_slice(), &reply].concat());
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");

        let error = negotiate(&mut proxy, &target).expect_err("proxy refuses");

        let SocksError::Rejected { code: got, reason } = error else {
            panic!("unexpected error: {error:?}");
        };
        assert_eq!(got, code);
        assert_eq!(reason, expected);
    }

    #[test]
    fn refused_methods_abort_before_connect() {
        let mut proxy = ScriptedProxy::new(&[0x05, 0xFF]);
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");

        let error = negotiate(&mut proxy, &target).expect_err("no method");

        assert!(matches!(error, SocksError::NoAcceptableMethod));
        assert_eq!(proxy.written, [0x05, 0x01, 0x00]);
    }

    #[test]
    fn non_socks5_proxies_are_rejected() {
        let mut proxy = ScriptedProxy::new(&[0x04, 0x00]);
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");

        let error = negotiate(&mut proxy, &target).expect_err("wrong version");

        assert!(matches!(error, SocksError::UnsupportedVersion { version: 4 }));
    }

    #[test]
    fn truncated_replies_surface_as_io_errors() {
        let mut proxy = ScriptedProxy::new(&[0x05, 0x00, 0x05]);
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");

        let error = negotiate(&mut proxy, &target).expect_err("short reply");

        assert!(matches!(error, SocksError::Io(_)));
    }

    #[test]
    fn overlong_domains_are_rejected() {
        let host = "a".repeat(256);
        let error = TargetAddr::new(&host, 1433).expect_err("too long");
        assert!(matches!(error, SocksError::DomainTooLong { .. }));
    }

    #[test]
    fn bracketed_ipv6_literals_become_addresses() {
        let target = TargetAddr::new("[fd7a::1]", 27017).expect("target");
        assert_eq!(target.to_string(), "[fd7a::1]:27017");
    }

    #[test]
    fn unix_proxies_are_unsupported() {
        let target = TargetAddr::new("10.0.0.5", 1433).expect("target");
        let error = connect(
            &SocketEndpoint::unix("/tmp/socks.sock"),
            &target,
            Duration::from_millis(100),
        )
        .expect_err("unix proxy");
        assert!(matches!(error, SocksError::UnsupportedProxy { .. }));
    }
}
