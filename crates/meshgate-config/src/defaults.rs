//! Fixed values shared by the orchestrator, the bridge manager and the relay.

use std::time::Duration;

/// Loopback interface every bridge listens on.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Control socket of the mesh daemon.
pub const DEFAULT_MESH_SOCKET: &str = "/tmp/tailscaled.sock";

/// State file of the mesh daemon.
pub const DEFAULT_MESH_STATE: &str = "/tmp/tailscaled.state";

/// Local SOCKS5 endpoint served by the mesh daemon.
pub const DEFAULT_SOCKS_ENDPOINT: &str = "tcp://127.0.0.1:1055";

/// Mesh daemon binary.
pub const DEFAULT_MESH_DAEMON: &str = "tailscaled";

/// Mesh control CLI binary.
pub const DEFAULT_MESH_CLI: &str = "tailscale";

/// Built-in relay binary launched once per bridge.
pub const DEFAULT_RELAY_BINARY: &str = "meshgate-relay";

/// `socat` binary used by the external forwarder.
pub const DEFAULT_SOCAT_BINARY: &str = "socat";

/// Prefix of the hostname announced to the mesh.
pub const DEFAULT_HOSTNAME_PREFIX: &str = "cloudrun-app";

/// Port the application server binds when `PORT` is unset.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Upper bound on waiting for the mesh "up" call, in seconds.
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 60;

/// Shared grace period after all bridges were launched, in milliseconds.
pub const DEFAULT_BRIDGE_GRACE_MS: u64 = 2_000;

/// Interval between control socket checks.
pub const MESH_SOCKET_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline for the control socket to appear.
pub const MESH_SOCKET_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval between SOCKS5 reachability probes.
pub const SOCKS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of SOCKS5 reachability probes before continuing degraded.
pub const SOCKS_POLL_ATTEMPTS: u32 = 30;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Application server command used when none is supplied after `--`.
///
/// `{port}` is replaced with the configured server port.
pub const DEFAULT_SERVER_COMMAND: &[&str] = &[
    "gunicorn",
    "--bind",
    "0.0.0.0:{port}",
    "--worker-class",
    "uvicorn.workers.UvicornWorker",
    "main:app",
];
