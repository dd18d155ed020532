//! Mesh client supervision: launch the daemon, wait for its control socket,
//! authenticate, then wait for the local SOCKS5 proxy.
//!
//! Only a daemon that cannot start, or whose control socket never appears,
//! stops startup. Authentication and proxy problems are reported and the
//! resulting [`MeshConnection`] records them, so bridges can still be
//! launched in degraded mode.

mod commands;
mod errors;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use meshgate_config::defaults::{
    MESH_SOCKET_POLL_INTERVAL, MESH_SOCKET_TIMEOUT, SOCKS_POLL_ATTEMPTS, SOCKS_POLL_INTERVAL,
};
use meshgate_config::{Config, SocketEndpoint};
use tracing::{debug, info, warn};

use crate::orchestrator::Services;
use crate::process::{ChildProcess, ProcessExit};
use crate::readiness::{PollPolicy, wait_for};

pub use errors::{AuthFailure, MeshError};

const MESH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::mesh");
const AUTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Paths, binaries and polling bounds of the mesh client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshSettings {
    /// Mesh daemon binary.
    pub daemon: PathBuf,
    /// Mesh control CLI binary.
    pub cli: PathBuf,
    /// Control socket the daemon creates.
    pub socket_path: Utf8PathBuf,
    /// State file of the daemon.
    pub state_path: PathBuf,
    /// Local SOCKS5 endpoint served by the daemon.
    pub socks: SocketEndpoint,
    /// Bound on the "up" call.
    pub auth_timeout: Duration,
    /// Wait for the control socket.
    pub socket_poll: PollPolicy,
    /// Wait for the SOCKS5 endpoint.
    pub socks_poll: PollPolicy,
}

impl MeshSettings {
    /// Settings taken from configuration with the standard polling bounds.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            daemon: config.mesh_daemon().to_path_buf(),
            cli: config.mesh_cli().to_path_buf(),
            socket_path: config.mesh_socket_path().to_path_buf(),
            state_path: config.mesh_state().to_path_buf(),
            socks: config.socks_endpoint().clone(),
            auth_timeout: config.auth_timeout(),
            socket_poll: PollPolicy::within(MESH_SOCKET_POLL_INTERVAL, MESH_SOCKET_TIMEOUT),
            socks_poll: PollPolicy::attempts(SOCKS_POLL_INTERVAL, SOCKS_POLL_ATTEMPTS),
        }
    }
}

/// A running mesh daemon and what is known about its readiness.
///
/// `authenticated` is decided once by [`MeshSupervisor::start`] and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConnection {
    pub(crate) socket_path: Utf8PathBuf,
    pub(crate) state_path: PathBuf,
    pub(crate) socks_endpoint: SocketEndpoint,
    pub(crate) identity_suffix: String,
    pub(crate) hostname: String,
    pub(crate) authenticated: bool,
    pub(crate) proxy_ready: bool,
    pub(crate) daemon_pid: u32,
}

impl MeshConnection {
    /// Control socket of the daemon.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket_path
    }

    /// State file of the daemon.
    #[must_use]
    pub fn state_path(&self) -> &std::path::Path {
        &self.state_path
    }

    /// Local SOCKS5 endpoint bridges route through.
    #[must_use]
    pub const fn socks_endpoint(&self) -> &SocketEndpoint {
        &self.socks_endpoint
    }

    /// Random token appended to the hostname prefix.
    #[must_use]
    pub fn identity_suffix(&self) -> &str {
        &self.identity_suffix
    }

    /// Hostname announced to the mesh.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Whether the "up" call succeeded.
    #[must_use]
    pub const fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the SOCKS5 endpoint was reachable.
    #[must_use]
    pub const fn proxy_ready(&self) -> bool {
        self.proxy_ready
    }

    /// Process id of the mesh daemon.
    #[must_use]
    pub const fn daemon_pid(&self) -> u32 {
        self.daemon_pid
    }
}

/// Brings up the mesh client with injected collaborators.
pub struct MeshSupervisor<'a> {
    services: &'a Services,
    settings: MeshSettings,
}

impl<'a> MeshSupervisor<'a> {
    /// Builds a supervisor.
    #[must_use]
    pub const fn new(services: &'a Services, settings: MeshSettings) -> Self {
        Self { services, settings }
    }

    /// Launches and authenticates the mesh daemon.
    ///
    /// `credential` may be absent, in which case the "up" call is skipped and
    /// the connection stays unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DaemonLaunch`], [`MeshError::DaemonTimeout`] or
    /// [`MeshError::DaemonExited`] when the daemon never becomes
    /// controllable. [`MeshError::AuthFailed`] and proxy failures are
    /// reported and leave the connection degraded instead.
    pub fn start(
        &self,
        credential: Option<&str>,
        hostname_prefix: &str,
    ) -> Result<MeshConnection, MeshError> {
        self.prepare_socket_path();

        let command = commands::daemon_command(&self.settings);
        let mut daemon = self
            .services
            .launcher
            .spawn(&command)
            .map_err(|source| MeshError::DaemonLaunch { source })?;
        let daemon_pid = daemon.pid();
        self.services
            .reporter
            .mesh_daemon_launched(daemon_pid, &command);

        self.await_control_socket(daemon.as_mut())?;

        let identity_suffix = commands::identity_suffix(&mut rand::thread_rng());
        let hostname = format!("{hostname_prefix}-{identity_suffix}");
        let authenticated = match self.authenticate(credential, &hostname) {
            Ok(()) => {
                self.services.reporter.mesh_authenticated(&hostname);
                true
            }
            Err(MeshError::AuthFailed(failure)) => {
                self.services.reporter.mesh_auth_failed(&failure);
                false
            }
            Err(error) => return Err(error),
        };

        let proxy_ready = self.await_proxy();

        Ok(MeshConnection {
            socket_path: self.settings.socket_path.clone(),
            state_path: self.settings.state_path.clone(),
            socks_endpoint: self.settings.socks.clone(),
            identity_suffix,
            hostname,
            authenticated,
            proxy_ready,
            daemon_pid,
        })
    }

    fn prepare_socket_path(&self) {
        let path = &self.settings.socket_path;
        match remove_stale_socket(path) {
            Ok(true) => info!(target: MESH_TARGET, path = %path, "removed stale control socket"),
            Ok(false) => {}
            Err(error) => warn!(
                target: MESH_TARGET,
                path = %path,
                error = %error,
                "failed to remove stale control socket"
            ),
        }
        if let Err(error) = SocketEndpoint::unix(path.clone()).ensure_parent_dir() {
            warn!(
                target: MESH_TARGET,
                error = %error,
                "failed to prepare control socket directory"
            );
        }
    }

    fn await_control_socket(&self, daemon: &mut dyn ChildProcess) -> Result<(), MeshError> {
        let path = self.settings.socket_path.as_std_path();
        let mut exited: Option<ProcessExit> = None;
        let outcome = wait_for(
            self.services.clock.as_ref(),
            self.settings.socket_poll,
            || {
                if self.services.probe.path_exists(path) {
                    return true;
                }
                match daemon.try_exit() {
                    Ok(Some(exit)) => {
                        exited = Some(exit);
                        true
                    }
                    Ok(None) => false,
                    Err(error) => {
                        debug!(target: MESH_TARGET, error = %error, "could not poll mesh daemon");
                        false
                    }
                }
            },
        );
        match (outcome, exited) {
            (_, Some(exit)) => Err(MeshError::DaemonExited { exit }),
            (Ok(report), None) => {
                info!(
                    target: MESH_TARGET,
                    path = %self.settings.socket_path,
                    attempts = report.attempts,
                    "control socket is up"
                );
                Ok(())
            }
            (Err(source), None) => Err(MeshError::DaemonTimeout {
                socket_path: self.settings.socket_path.clone(),
                source,
            }),
        }
    }

    fn authenticate(&self, credential: Option<&str>, hostname: &str) -> Result<(), MeshError> {
        let key = credential
            .filter(|key| !key.trim().is_empty())
            .ok_or(AuthFailure::MissingCredential)?;
        let command = commands::up_command(&self.settings, key, hostname);
        info!(target: MESH_TARGET, command = %command, "bringing the mesh network up");
        let mut cli = self
            .services
            .launcher
            .spawn(&command)
            .map_err(|source| AuthFailure::Launch { source })?;

        let mut finished: Option<io::Result<ProcessExit>> = None;
        wait_for(
            self.services.clock.as_ref(),
            PollPolicy::within(AUTH_POLL_INTERVAL, self.settings.auth_timeout),
            || match cli.try_exit() {
                Ok(None) => false,
                Ok(Some(exit)) => {
                    finished = Some(Ok(exit));
                    true
                }
                Err(error) => {
                    finished = Some(Err(error));
                    true
                }
            },
        )
        .map_err(|source| AuthFailure::Timeout { source })?;

        let failure = match finished {
            Some(Ok(exit)) if exit.success() => return Ok(()),
            Some(Ok(exit)) => AuthFailure::Rejected { exit },
            Some(Err(source)) => AuthFailure::Monitor { source },
            None => AuthFailure::Monitor {
                source: io::Error::other("control CLI finished without a status"),
            },
        };
        Err(failure.into())
    }

    fn await_proxy(&self) -> bool {
        let endpoint = &self.settings.socks;
        match wait_for(self.services.clock.as_ref(), self.settings.socks_poll, || {
            self.services.probe.endpoint_reachable(endpoint)
        }) {
            Ok(report) => {
                self.services.reporter.proxy_ready(endpoint, &report);
                true
            }
            Err(timeout) => {
                self.services.reporter.proxy_degraded(endpoint, &timeout);
                false
            }
        }
    }
}

/// Removes a leftover control socket from a previous run.
///
/// Returns whether a file was removed; a missing file is not an error, so
/// repeated calls are harmless.
///
/// # Errors
///
/// Returns the underlying error for anything other than a missing file.
pub fn remove_stale_socket(path: &Utf8Path) -> io::Result<bool> {
    match fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}
