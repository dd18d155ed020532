//! Forwarder command lines for the relay and socat forwarders.

use std::borrow::Cow;
use std::env;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use meshgate_config::defaults::{DEFAULT_RELAY_BINARY, DEFAULT_SOCAT_BINARY, LOOPBACK_HOST};
use meshgate_config::{BridgeSpec, Config, ForwarderKind, LogSettings, SocketEndpoint};
use meshgate_relay::RelayArgs;

use super::BridgeError;
use crate::process::CommandSpec;

/// How bridge forwarders are launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderPlan {
    kind: ForwarderKind,
    relay_bin: PathBuf,
    socat_bin: PathBuf,
    max_connections: Option<NonZeroUsize>,
    log: LogSettings,
}

impl ForwarderPlan {
    /// Plan taken from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            kind: config.forwarder(),
            relay_bin: resolve_relay_binary(config.relay_bin()),
            socat_bin: PathBuf::from(DEFAULT_SOCAT_BINARY),
            max_connections: config.max_bridge_connections(),
            log: config.log_settings(),
        }
    }

    /// Builds a plan for an explicit forwarder binary.
    #[must_use]
    pub fn new(kind: ForwarderKind, binary: impl Into<PathBuf>, log: LogSettings) -> Self {
        let binary = binary.into();
        Self {
            kind,
            relay_bin: binary.clone(),
            socat_bin: binary,
            max_connections: None,
            log,
        }
    }

    /// Caps concurrent connections per relay bridge.
    #[must_use]
    pub fn with_max_connections(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.max_connections = limit;
        self
    }

    /// Forwarding program in use.
    #[must_use]
    pub const fn kind(&self) -> ForwarderKind {
        self.kind
    }

    /// Command that forwards `127.0.0.1:{local_port}` to `remote_host` via
    /// `proxy`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnsupportedProxy`] when `proxy` is not TCP.
    pub fn command(
        &self,
        spec: &BridgeSpec,
        remote_host: &str,
        proxy: &SocketEndpoint,
    ) -> Result<CommandSpec, BridgeError> {
        let Some((proxy_host, proxy_port)) = proxy.tcp_address() else {
            return Err(BridgeError::UnsupportedProxy {
                backend: spec.backend(),
                endpoint: proxy.to_string(),
            });
        };
        let command = match self.kind {
            ForwarderKind::Relay => {
                let args = RelayArgs {
                    listen_host: LOOPBACK_HOST.to_owned(),
                    listen_port: spec.local_port(),
                    target_host: remote_host.to_owned(),
                    target_port: spec.remote_port(),
                    proxy: proxy.clone(),
                    max_connections: self.max_connections,
                    log_filter: self.log.filter().to_owned(),
                    log_format: self.log.format(),
                };
                CommandSpec::new(&self.relay_bin).args(args.to_arguments())
            }
            ForwarderKind::Socat => CommandSpec::new(&self.socat_bin)
                .arg(format!(
                    "TCP-LISTEN:{},bind={LOOPBACK_HOST},fork,reuseaddr",
                    spec.local_port()
                ))
                .arg(format!(
                    "SOCKS5-CONNECT:{}:{proxy_port}:{}:{}",
                    socat_host(proxy_host),
                    socat_host(remote_host),
                    spec.remote_port()
                )),
        };
        Ok(command)
    }
}

/// socat splits address fields on `:`, so IPv6 literals need brackets.
fn socat_host(host: &str) -> Cow<'_, str> {
    if host.contains(':') && !host.starts_with('[') {
        Cow::Owned(format!("[{host}]"))
    } else {
        Cow::Borrowed(host)
    }
}

/// Prefers a relay installed next to the running executable when the
/// configured path is the bare default name.
fn resolve_relay_binary(configured: &Path) -> PathBuf {
    if configured != Path::new(DEFAULT_RELAY_BINARY) {
        return configured.to_path_buf();
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_RELAY_BINARY)))
        .filter(|sibling| sibling.is_file())
        .unwrap_or_else(|| configured.to_path_buf())
}
