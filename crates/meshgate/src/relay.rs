//! Entry point of the `meshgate-relay` forwarder process.

use std::io::Write;
use std::process::ExitCode;

use meshgate_relay::{RelayArgs, start_relay};
use tracing::{error, info};

use crate::process::{ShutdownSignal, SystemShutdownSignal};
use crate::telemetry;

const RELAY_TARGET: &str = "meshgate_relay::runtime";

/// Runs a relay until a termination signal arrives.
///
/// Exits with status 1 as soon as the listen port cannot be bound, which the
/// bridge manager reads as a bind failure.
pub fn run_relay<E: Write>(args: &RelayArgs, stderr: &mut E) -> ExitCode {
    run_relay_with(args, &SystemShutdownSignal, stderr)
}

/// Runs a relay with an injected shutdown signal.
pub fn run_relay_with<S, E>(args: &RelayArgs, shutdown: &S, stderr: &mut E) -> ExitCode
where
    S: ShutdownSignal + ?Sized,
    E: Write,
{
    if let Err(failure) = telemetry::initialise(&args.log_settings()) {
        drop(writeln!(stderr, "meshgate-relay: {failure}"));
        return ExitCode::FAILURE;
    }
    let handle = match start_relay(args) {
        Ok(handle) => handle,
        Err(failure) => {
            error!(
                target: RELAY_TARGET,
                listen_port = args.listen_port,
                error = %failure,
                "relay failed to start"
            );
            drop(writeln!(stderr, "meshgate-relay: {failure}"));
            return ExitCode::FAILURE;
        }
    };
    info!(
        target: RELAY_TARGET,
        listen = %handle.local_addr(),
        target_host = %args.target_host,
        target_port = args.target_port,
        proxy = %args.proxy,
        "relay started"
    );

    let waited = shutdown.wait();
    let in_flight = handle.active_connections();
    handle.shutdown();
    let joined = handle.join();
    match (waited, joined) {
        (Ok(signal), Ok(())) => {
            info!(
                target: RELAY_TARGET,
                signal = ?signal,
                in_flight,
                "relay stopped"
            );
            ExitCode::SUCCESS
        }
        (Err(failure), _) => {
            error!(target: RELAY_TARGET, error = %failure, "relay shutdown failed");
            ExitCode::FAILURE
        }
        (_, Err(failure)) => {
            error!(target: RELAY_TARGET, error = %failure, "relay shutdown failed");
            ExitCode::FAILURE
        }
    }
}
