//! Shared configuration for the `meshgate` startup supervisor.
//!
//! Configuration is read once at process start. Every option is a long flag
//! with an environment-variable fallback so the container contract
//! (`TAILSCALE_AUTHKEY`, `MSSQL_REMOTE_IP`, `POSTGRES_REMOTE_IP`, `PORT`, ...)
//! keeps working while operators and tests can override values on the
//! command line. Anything following `--` is the application server command.

mod bridge;
pub mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::builder::{OsStr, Resettable};
use clap::{CommandFactory, FromArgMatches, Parser};

pub use bridge::{BridgeSpec, BridgeSpecError, DatabaseBackend, ForwarderKind};
pub use logging::{LogFormat, LogFormatParseError, LogSettings};
pub use socket::{EndpointParseError, SocketDirError, SocketEndpoint};

use defaults::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_BRIDGE_GRACE_MS, DEFAULT_HOSTNAME_PREFIX, DEFAULT_LOG_FILTER,
    DEFAULT_MESH_CLI, DEFAULT_MESH_DAEMON, DEFAULT_MESH_SOCKET, DEFAULT_MESH_STATE,
    DEFAULT_RELAY_BINARY, DEFAULT_SERVER_PORT, DEFAULT_SOCKS_ENDPOINT,
};

/// Resolved startup configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "meshgate",
    version,
    about = "Joins the mesh network, opens database bridges, then execs the application server"
)]
pub struct Config {
    /// Mesh authentication key.
    #[arg(long, env = "TAILSCALE_AUTHKEY", hide_env_values = true)]
    authkey: Option<String>,

    /// Remote host of the MSSQL database; enables the 1433 bridge.
    #[arg(long, env = "MSSQL_REMOTE_IP")]
    mssql_remote_ip: Option<String>,

    /// Remote host of the PostgreSQL database; enables the 5432 bridge.
    #[arg(long, env = "POSTGRES_REMOTE_IP")]
    postgres_remote_ip: Option<String>,

    /// Remote host of the MySQL database; enables the 3306 bridge.
    #[arg(long, env = "MYSQL_REMOTE_IP")]
    mysql_remote_ip: Option<String>,

    /// Remote host of the MongoDB database; enables the 27017 bridge.
    #[arg(long, env = "MONGODB_REMOTE_IP")]
    mongodb_remote_ip: Option<String>,

    /// Port the application server binds.
    #[arg(
        long,
        env = "PORT",
        default_value_t = DEFAULT_SERVER_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    port: u16,

    /// Prefix of the hostname announced to the mesh.
    #[arg(long, env = "MESHGATE_HOSTNAME_PREFIX", default_value = DEFAULT_HOSTNAME_PREFIX)]
    hostname_prefix: String,

    /// Control socket of the mesh daemon.
    #[arg(long, env = "MESHGATE_MESH_SOCKET", default_value = DEFAULT_MESH_SOCKET)]
    mesh_socket: Utf8PathBuf,

    /// State file of the mesh daemon.
    #[arg(long, env = "MESHGATE_MESH_STATE", default_value = DEFAULT_MESH_STATE)]
    mesh_state: PathBuf,

    /// SOCKS5 endpoint served by the mesh daemon.
    #[arg(long, env = "MESHGATE_SOCKS_ENDPOINT", default_value = DEFAULT_SOCKS_ENDPOINT)]
    socks_endpoint: SocketEndpoint,

    /// Mesh daemon binary.
    #[arg(long, env = "MESHGATE_MESH_DAEMON", default_value = DEFAULT_MESH_DAEMON)]
    mesh_daemon: PathBuf,

    /// Mesh control CLI binary.
    #[arg(long, env = "MESHGATE_MESH_CLI", default_value = DEFAULT_MESH_CLI)]
    mesh_cli: PathBuf,

    /// Seconds to wait for the mesh "up" call before continuing degraded.
    #[arg(long, env = "MESHGATE_AUTH_TIMEOUT_SECS", default_value_t = DEFAULT_AUTH_TIMEOUT_SECS)]
    auth_timeout_secs: u64,

    /// Forwarding program used for each bridge.
    #[arg(long, env = "MESHGATE_FORWARDER", default_value_t = ForwarderKind::Relay)]
    forwarder: ForwarderKind,

    /// Relay binary used by the `relay` forwarder.
    #[arg(long, env = "MESHGATE_RELAY_BIN", default_value = DEFAULT_RELAY_BINARY)]
    relay_bin: PathBuf,

    /// Concurrent connection cap per bridge; unbounded when unset.
    #[arg(long, env = "MESHGATE_MAX_BRIDGE_CONNECTIONS")]
    max_bridge_connections: Option<NonZeroUsize>,

    /// Milliseconds to wait after launching the bridges.
    #[arg(long, env = "MESHGATE_BRIDGE_GRACE_MS", default_value_t = DEFAULT_BRIDGE_GRACE_MS)]
    bridge_grace_ms: u64,

    /// `tracing` filter expression.
    #[arg(long, env = "MESHGATE_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,

    /// Log output format.
    #[arg(long, env = "MESHGATE_LOG_FORMAT", default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Application server command; `{port}` is replaced with the server port.
    #[arg(last = true, value_name = "SERVER_COMMAND")]
    server_command: Vec<String>,
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the [`clap::Error`] describing the invalid or missing value;
    /// help and version requests also surface as errors.
    pub fn load() -> Result<Self, clap::Error> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from explicit arguments and the environment.
    ///
    /// # Errors
    ///
    /// Returns the [`clap::Error`] describing the invalid or missing value.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut matches = command_without_blank_env().try_get_matches_from(args)?;
        Self::from_arg_matches_mut(&mut matches)
    }

    /// Mesh credential, treating an empty value as absent.
    #[must_use]
    pub fn authkey(&self) -> Option<&str> {
        self.authkey.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Remote host configured for a backend.
    #[must_use]
    pub fn remote_host(&self, backend: DatabaseBackend) -> Option<&str> {
        match backend {
            DatabaseBackend::Mssql => self.mssql_remote_ip.as_deref(),
            DatabaseBackend::Postgres => self.postgres_remote_ip.as_deref(),
            DatabaseBackend::Mysql => self.mysql_remote_ip.as_deref(),
            DatabaseBackend::Mongodb => self.mongodb_remote_ip.as_deref(),
        }
    }

    /// One bridge spec per recognised backend, enabled or not.
    #[must_use]
    pub fn bridge_specs(&self) -> Vec<BridgeSpec> {
        DatabaseBackend::ALL
            .into_iter()
            .map(|backend| BridgeSpec::for_backend(backend, self.remote_host(backend)))
            .collect()
    }

    /// Port the application server binds.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Prefix of the announced mesh hostname.
    #[must_use]
    pub fn hostname_prefix(&self) -> &str {
        &self.hostname_prefix
    }

    /// Control socket endpoint of the mesh daemon.
    #[must_use]
    pub fn mesh_socket(&self) -> SocketEndpoint {
        SocketEndpoint::unix(self.mesh_socket.clone())
    }

    /// Filesystem path of the mesh daemon's control socket.
    #[must_use]
    pub fn mesh_socket_path(&self) -> &Utf8Path {
        &self.mesh_socket
    }

    /// State file of the mesh daemon.
    #[must_use]
    pub fn mesh_state(&self) -> &Path {
        &self.mesh_state
    }

    /// SOCKS5 endpoint served by the mesh daemon.
    #[must_use]
    pub const fn socks_endpoint(&self) -> &SocketEndpoint {
        &self.socks_endpoint
    }

    /// Mesh daemon binary.
    #[must_use]
    pub fn mesh_daemon(&self) -> &Path {
        &self.mesh_daemon
    }

    /// Mesh control CLI binary.
    #[must_use]
    pub fn mesh_cli(&self) -> &Path {
        &self.mesh_cli
    }

    /// Bound on waiting for the mesh "up" call.
    #[must_use]
    pub const fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Forwarding program used for each bridge.
    #[must_use]
    pub const fn forwarder(&self) -> ForwarderKind {
        self.forwarder
    }

    /// Relay binary used by the `relay` forwarder.
    #[must_use]
    pub fn relay_bin(&self) -> &Path {
        &self.relay_bin
    }

    /// Concurrent connection cap per bridge.
    #[must_use]
    pub const fn max_bridge_connections(&self) -> Option<NonZeroUsize> {
        self.max_bridge_connections
    }

    /// Shared grace period after launching the bridges.
    #[must_use]
    pub const fn bridge_grace(&self) -> Duration {
        Duration::from_millis(self.bridge_grace_ms)
    }

    /// Logging filter and format.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings::new(self.log_filter.clone(), self.log_format)
    }

    /// Application server command as supplied after `--`, possibly empty.
    #[must_use]
    pub fn server_command(&self) -> &[String] {
        &self.server_command
    }
}

/// The `Config` command with environment fallbacks dropped for variables
/// that are set but blank, so they fall through to the defaults.
fn command_without_blank_env() -> clap::Command {
    Config::command().mut_args(|arg| {
        let blank = arg
            .get_env()
            .and_then(std::env::var_os)
            .is_some_and(|value| value.to_str().is_some_and(|text| text.trim().is_empty()));
        if blank {
            arg.env(Resettable::<OsStr>::Reset)
        } else {
            arg
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(args: &[&str]) -> Config {
        let mut argv = vec!["meshgate"];
        argv.extend_from_slice(args);
        Config::load_from_iter(argv).expect("configuration should load")
    }

    #[test]
    fn flags_override_fixed_mesh_paths() {
        let config = load(&[
            "--mesh-socket",
            "/run/mesh/ctl.sock",
            "--socks-endpoint",
            "tcp://127.0.0.1:2055",
        ]);
        assert_eq!(config.mesh_socket(), SocketEndpoint::unix("/run/mesh/ctl.sock"));
        assert_eq!(config.socks_endpoint(), &SocketEndpoint::tcp("127.0.0.1", 2055));
    }

    #[test]
    fn trailing_arguments_form_the_server_command() {
        let config = load(&["--", "uvicorn", "main:app", "--port", "{port}"]);
        assert_eq!(
            config.server_command(),
            ["uvicorn", "main:app", "--port", "{port}"]
        );
    }

    #[test]
    fn blank_authkeys_count_as_absent() {
        let config = load(&["--authkey", "  "]);
        assert_eq!(config.authkey(), None);
    }

    #[test]
    fn bridge_specs_cover_every_backend() {
        let config = load(&["--postgres-remote-ip", "100.64.0.7"]);
        let specs = config.bridge_specs();
        assert_eq!(specs.len(), DatabaseBackend::ALL.len());
        let enabled: Vec<_> = specs.iter().filter(|spec| spec.enabled()).collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].backend(), DatabaseBackend::Postgres);
        assert_eq!(enabled[0].remote_host(), Some("100.64.0.7"));
    }

    #[test]
    fn rejects_zero_server_port() {
        let error = Config::load_from_iter(["meshgate", "--port", "0"]).expect_err("port 0");
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_unknown_forwarders() {
        let error =
            Config::load_from_iter(["meshgate", "--forwarder", "netcat"]).expect_err("forwarder");
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
