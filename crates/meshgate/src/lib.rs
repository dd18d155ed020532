//! Startup supervisor that joins a mesh network, opens database bridges
//! through the mesh's SOCKS5 proxy, then execs the application server.
//!
//! Startup is strictly sequential and runs on one thread:
//!
//! 1. The mesh daemon is launched and its control socket awaited. This is
//!    the only step whose failure aborts startup (exit status 1).
//! 2. The node authenticates with the configured auth key and the local
//!    SOCKS5 proxy is awaited. Failures here are reported and startup
//!    continues in degraded mode.
//! 3. One forwarder process per configured database bridge is launched,
//!    followed by a shared grace period and a single listening check.
//! 4. The process image is replaced with the application server.
//!
//! The same package ships the `meshgate-relay` forwarder binary; see
//! [`run_relay`].

mod bridge;
mod health;
mod mesh;
mod orchestrator;
mod process;
mod readiness;
mod relay;
mod server;
mod telemetry;

#[cfg(test)]
mod tests;

use std::io::Write;
use std::process::ExitCode;

use meshgate_config::Config;

pub use bridge::{BridgeError, BridgeHandle, BridgeSetManager, ForwarderPlan};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use mesh::{
    AuthFailure, MeshConnection, MeshError, MeshSettings, MeshSupervisor, remove_stale_socket,
};
pub use orchestrator::{Orchestrator, OrchestratorError, Phase, Services};
pub use process::{
    ChildProcess, CommandSpec, ExecHandoff, ProcessExit, ProcessLauncher, ServerHandoff,
    ShutdownError, ShutdownSignal, SpawnError, SystemLauncher, SystemShutdownSignal,
};
pub use readiness::{
    Clock, PollPolicy, PollReport, ReadinessProbe, ReadinessTimeout, SystemClock, SystemProbe,
    wait_for,
};
pub use relay::{run_relay, run_relay_with};
pub use server::server_command;
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Runs the orchestrator with production collaborators.
///
/// Only returns when startup failed; the returned code is the process exit
/// status. Errors that occur before logging is available are written to
/// `stderr`.
pub fn run<E: Write>(config: Config, stderr: &mut E) -> ExitCode {
    if let Err(error) = telemetry::initialise(&config.log_settings()) {
        let failure = OrchestratorError::from(error);
        // Best effort: there is nowhere else to report a failing stderr.
        drop(writeln!(stderr, "meshgate: {failure}"));
        return ExitCode::from(failure.exit_code());
    }
    match Orchestrator::new(config, Services::system(), ExecHandoff).run() {
        Ok(never) => match never {},
        Err(error) => ExitCode::from(error.exit_code()),
    }
}
