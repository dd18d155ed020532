//! Bounded polling for startup readiness conditions.
//!
//! Every wait in the startup sequence goes through [`wait_for`]: the socket
//! wait, the authentication wait, the SOCKS5 wait and the bridge checks. Time
//! and the world are reached through [`Clock`] and [`ReadinessProbe`] so the
//! waits can run against virtual time in tests.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use meshgate_config::SocketEndpoint;
use thiserror::Error;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Source of time for polling loops.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and [`thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Observations a readiness predicate can make.
pub trait ReadinessProbe: Send + Sync {
    /// Whether a filesystem object exists at `path`.
    fn path_exists(&self, path: &Path) -> bool;

    /// Whether `endpoint` currently accepts connections.
    fn endpoint_reachable(&self, endpoint: &SocketEndpoint) -> bool;
}

/// Probe that looks at the real filesystem and network.
#[derive(Debug, Clone, Copy)]
pub struct SystemProbe {
    connect_timeout: Duration,
}

impl SystemProbe {
    /// Builds a probe with a custom connect timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(PROBE_CONNECT_TIMEOUT)
    }
}

impl ReadinessProbe for SystemProbe {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn endpoint_reachable(&self, endpoint: &SocketEndpoint) -> bool {
        try_connect(endpoint, self.connect_timeout).is_ok()
    }
}

fn try_connect(endpoint: &SocketEndpoint, timeout: Duration) -> io::Result<()> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let address = resolve_tcp(host, *port)?;
            TcpStream::connect_timeout(&address, timeout).map(|_| ())
        }
        SocketEndpoint::Unix { path } => connect_unix(path.as_str(), timeout),
    }
}

fn resolve_tcp(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))
}

#[cfg(unix)]
fn connect_unix(path: &str, timeout: Duration) -> io::Result<()> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)
}

#[cfg(not(unix))]
fn connect_unix(_path: &str, _timeout: Duration) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unix sockets unsupported on this platform",
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollLimit {
    Deadline(Duration),
    Attempts(u32),
}

/// Interval and bound of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    limit: PollLimit,
}

impl PollPolicy {
    /// Polls every `interval` until `timeout` has elapsed.
    ///
    /// The loop gives up as soon as the next sleep would cross the deadline,
    /// so a 1 s / 15 s policy evaluates its predicate 16 times.
    #[must_use]
    pub const fn within(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            limit: PollLimit::Deadline(timeout),
        }
    }

    /// Polls every `interval`, evaluating the predicate at most `attempts`
    /// times (at least once).
    #[must_use]
    pub const fn attempts(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            limit: PollLimit::Attempts(if attempts == 0 { 1 } else { attempts }),
        }
    }

    /// Sleep between evaluations.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        match self.limit {
            PollLimit::Deadline(timeout) => elapsed
                .checked_add(self.interval)
                .is_none_or(|next| next > timeout),
            PollLimit::Attempts(max) => attempts >= max,
        }
    }
}

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Predicate evaluations, including the successful one.
    pub attempts: u32,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// A readiness predicate never became true within its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("condition not met after {attempts} attempts over {elapsed:?}")]
pub struct ReadinessTimeout {
    /// Predicate evaluations performed.
    pub attempts: u32,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// Evaluates `predicate` until it returns `true` or `policy` is exhausted.
///
/// The predicate is evaluated before the first sleep, so a condition that
/// already holds costs no waiting. Whatever the predicate waits on is left
/// untouched on timeout; the caller decides how to react.
///
/// # Errors
///
/// Returns [`ReadinessTimeout`] when the policy runs out first.
pub fn wait_for<C, F>(
    clock: &C,
    policy: PollPolicy,
    mut predicate: F,
) -> Result<PollReport, ReadinessTimeout>
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    let started = clock.now();
    let mut attempts = 0_u32;
    loop {
        attempts = attempts.saturating_add(1);
        let satisfied = predicate();
        let elapsed = clock.now().saturating_duration_since(started);
        if satisfied {
            return Ok(PollReport { attempts, elapsed });
        }
        if policy.exhausted(attempts, elapsed) {
            return Err(ReadinessTimeout { attempts, elapsed });
        }
        clock.sleep(policy.interval);
    }
}
