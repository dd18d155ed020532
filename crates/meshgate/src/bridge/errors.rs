use std::io;

use meshgate_config::DatabaseBackend;
use thiserror::Error;

use crate::process::{ProcessExit, SpawnError};

/// Failure of a single bridge. Never affects sibling bridges.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The forwarder could not be started.
    #[error("failed to launch {backend} bridge: {source}")]
    Launch {
        /// Backend of the bridge.
        backend: DatabaseBackend,
        /// Underlying spawn error.
        #[source]
        source: SpawnError,
    },
    /// The forwarder exited, typically because the local port was taken.
    #[error("{backend} bridge on 127.0.0.1:{port} exited ({exit}); the port is likely in use")]
    Bind {
        /// Backend of the bridge.
        backend: DatabaseBackend,
        /// Local port the forwarder tried to bind.
        port: u16,
        /// How the forwarder exited.
        exit: ProcessExit,
    },
    /// The forwarder's status could not be read.
    #[error("failed to monitor {backend} bridge: {source}")]
    Monitor {
        /// Backend of the bridge.
        backend: DatabaseBackend,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The proxy endpoint cannot be used by a forwarder.
    #[error("{backend} bridge cannot route through non-TCP proxy {endpoint}")]
    UnsupportedProxy {
        /// Backend of the bridge.
        backend: DatabaseBackend,
        /// Rendered proxy endpoint.
        endpoint: String,
    },
}

impl BridgeError {
    /// Backend of the failed bridge.
    #[must_use]
    pub const fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Launch { backend, .. }
            | Self::Bind { backend, .. }
            | Self::Monitor { backend, .. }
            | Self::UnsupportedProxy { backend, .. } => *backend,
        }
    }
}
