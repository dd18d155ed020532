use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::process::{ProcessExit, SpawnError};
use crate::readiness::ReadinessTimeout;

/// Errors raised while bringing up the mesh client.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The daemon binary could not be started.
    #[error("failed to launch mesh daemon: {source}")]
    DaemonLaunch {
        /// Underlying spawn error.
        #[source]
        source: SpawnError,
    },
    /// The control socket did not appear in time.
    #[error("mesh daemon control socket {socket_path} did not appear: {source}")]
    DaemonTimeout {
        /// Socket path that was awaited.
        socket_path: Utf8PathBuf,
        /// Poller outcome.
        #[source]
        source: ReadinessTimeout,
    },
    /// The daemon exited before its control socket appeared.
    #[error("mesh daemon exited before its control socket appeared ({exit})")]
    DaemonExited {
        /// How the daemon exited.
        exit: ProcessExit,
    },
    /// The "up" call did not authenticate the node. Never fatal: the
    /// supervisor reports it and continues unauthenticated.
    #[error("mesh authentication failed: {0}")]
    AuthFailed(#[from] AuthFailure),
}

impl MeshError {
    /// Whether startup must abort.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::AuthFailed(_))
    }
}

/// Reasons the "up" call did not authenticate the node.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// No credential was configured.
    #[error("no mesh auth key configured")]
    MissingCredential,
    /// The control CLI could not be started.
    #[error("failed to launch mesh control CLI: {source}")]
    Launch {
        /// Underlying spawn error.
        #[source]
        source: SpawnError,
    },
    /// The control CLI reported failure.
    #[error("mesh control CLI failed with {exit}")]
    Rejected {
        /// How the CLI exited.
        exit: ProcessExit,
    },
    /// The control CLI did not finish in time; it is left running.
    #[error("mesh control CLI did not finish: {source}")]
    Timeout {
        /// Poller outcome.
        #[source]
        source: ReadinessTimeout,
    },
    /// The control CLI's status could not be read.
    #[error("failed to monitor mesh control CLI: {source}")]
    Monitor {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
