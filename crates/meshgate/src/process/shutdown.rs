use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;

const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Source of the request to stop a long-running helper such as the relay.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until the helper should stop.
    ///
    /// Returns the signal number that ended the wait, when there was one.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when termination requests cannot be observed.
    fn wait(&self) -> Result<Option<i32>, ShutdownError>;
}

/// Termination requests could not be observed.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Registering the signal handlers failed.
    #[error("cannot watch termination signals: {0}")]
    Register(#[source] io::Error),
}

/// Waits for SIGTERM, SIGINT, SIGQUIT or SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<Option<i32>, ShutdownError> {
        let mut signals = Signals::new(TERMINATION_SIGNALS).map_err(ShutdownError::Register)?;
        Ok(signals.forever().next())
    }
}
