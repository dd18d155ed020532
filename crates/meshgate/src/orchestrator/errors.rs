use std::io;

use thiserror::Error;

use crate::mesh::MeshError;
use crate::telemetry::TelemetryError;

const EXIT_FAILURE: u8 = 1;
const EXIT_NOT_EXECUTABLE: u8 = 126;
const EXIT_NOT_FOUND: u8 = 127;

/// Reasons startup aborted.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Logging could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The mesh daemon never became controllable.
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// The application server could not replace this process.
    #[error("failed to execute application server {program}: {source}")]
    Handoff {
        /// Server program.
        program: String,
        /// Underlying exec error.
        #[source]
        source: io::Error,
    },
}

impl OrchestratorError {
    /// Process exit status for this failure, following the shell convention
    /// of 127 for a missing program and 126 for one that cannot run.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Telemetry(_) | Self::Mesh(_) => EXIT_FAILURE,
            Self::Handoff { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                EXIT_NOT_FOUND
            }
            Self::Handoff { .. } => EXIT_NOT_EXECUTABLE,
        }
    }
}
