//! Structured health reporting for startup lifecycle events.

use std::sync::Arc;

use meshgate_config::{BridgeSpec, SocketEndpoint};

use crate::bridge::BridgeError;
use crate::mesh::AuthFailure;
use crate::orchestrator::{OrchestratorError, Phase};
use crate::process::CommandSpec;
use crate::readiness::{PollReport, ReadinessTimeout};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface startup events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked when the orchestrator enters a phase.
    fn phase_entered(&self, phase: Phase);

    /// Invoked after the mesh daemon process has been spawned.
    fn mesh_daemon_launched(&self, pid: u32, command: &CommandSpec);

    /// Invoked when the mesh accepted the credential.
    fn mesh_authenticated(&self, hostname: &str);

    /// Invoked when authentication failed; startup continues degraded.
    fn mesh_auth_failed(&self, failure: &AuthFailure);

    /// Invoked when the local SOCKS5 endpoint accepts connections.
    fn proxy_ready(&self, endpoint: &SocketEndpoint, report: &PollReport);

    /// Invoked when the SOCKS5 endpoint never became reachable.
    fn proxy_degraded(&self, endpoint: &SocketEndpoint, timeout: &ReadinessTimeout);

    /// Invoked for a bridge without a remote host.
    fn bridge_skipped(&self, spec: &BridgeSpec);

    /// Invoked after a forwarder process has been spawned.
    fn bridge_launched(&self, spec: &BridgeSpec, pid: u32, command: &CommandSpec);

    /// Invoked when one bridge failed; siblings are unaffected.
    fn bridge_failed(&self, error: &BridgeError);

    /// Invoked when a bridge was confirmed to accept connections.
    fn bridge_listening(&self, spec: &BridgeSpec);

    /// Invoked when a running bridge could not be confirmed as listening.
    fn bridge_pending(&self, spec: &BridgeSpec);

    /// Invoked immediately before the process is replaced by the server.
    fn server_handoff(&self, command: &CommandSpec);

    /// Invoked when startup aborts.
    fn startup_failed(&self, error: &OrchestratorError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn phase_entered(&self, phase: Phase) {
        (**self).phase_entered(phase);
    }

    fn mesh_daemon_launched(&self, pid: u32, command: &CommandSpec) {
        (**self).mesh_daemon_launched(pid, command);
    }

    fn mesh_authenticated(&self, hostname: &str) {
        (**self).mesh_authenticated(hostname);
    }

    fn mesh_auth_failed(&self, failure: &AuthFailure) {
        (**self).mesh_auth_failed(failure);
    }

    fn proxy_ready(&self, endpoint: &SocketEndpoint, report: &PollReport) {
        (**self).proxy_ready(endpoint, report);
    }

    fn proxy_degraded(&self, endpoint: &SocketEndpoint, timeout: &ReadinessTimeout) {
        (**self).proxy_degraded(endpoint, timeout);
    }

    fn bridge_skipped(&self, spec: &BridgeSpec) {
        (**self).bridge_skipped(spec);
    }

    fn bridge_launched(&self, spec: &BridgeSpec, pid: u32, command: &CommandSpec) {
        (**self).bridge_launched(spec, pid, command);
    }

    fn bridge_failed(&self, error: &BridgeError) {
        (**self).bridge_failed(error);
    }

    fn bridge_listening(&self, spec: &BridgeSpec) {
        (**self).bridge_listening(spec);
    }

    fn bridge_pending(&self, spec: &BridgeSpec) {
        (**self).bridge_pending(spec);
    }

    fn server_handoff(&self, command: &CommandSpec) {
        (**self).server_handoff(command);
    }

    fn startup_failed(&self, error: &OrchestratorError) {
        (**self).startup_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn phase_entered(&self, phase: Phase) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "phase_entered",
            phase = %phase,
            "startup phase entered"
        );
    }

    fn mesh_daemon_launched(&self, pid: u32, command: &CommandSpec) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "mesh_daemon_launched",
            pid,
            command = %command,
            "mesh daemon launched"
        );
    }

    fn mesh_authenticated(&self, hostname: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "mesh_authenticated",
            hostname,
            "mesh network is up"
        );
    }

    fn mesh_auth_failed(&self, failure: &AuthFailure) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "mesh_auth_failed",
            error = %failure,
            "mesh authentication failed; continuing without it"
        );
    }

    fn proxy_ready(&self, endpoint: &SocketEndpoint, report: &PollReport) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "proxy_ready",
            endpoint = %endpoint,
            attempts = report.attempts,
            elapsed_ms = report.elapsed.as_millis(),
            "SOCKS5 proxy is reachable"
        );
    }

    fn proxy_degraded(&self, endpoint: &SocketEndpoint, timeout: &ReadinessTimeout) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "proxy_degraded",
            endpoint = %endpoint,
            attempts = timeout.attempts,
            elapsed_ms = timeout.elapsed.as_millis(),
            "SOCKS5 proxy not reachable; bridges may fail to connect"
        );
    }

    fn bridge_skipped(&self, spec: &BridgeSpec) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bridge_skipped",
            backend = %spec.backend(),
            env = spec.backend().remote_host_env(),
            "no remote host configured; bridge skipped"
        );
    }

    fn bridge_launched(&self, spec: &BridgeSpec, pid: u32, command: &CommandSpec) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bridge_launched",
            backend = %spec.backend(),
            local_port = spec.local_port(),
            remote_host = spec.remote_host().unwrap_or_default(),
            remote_port = spec.remote_port(),
            pid,
            command = %command,
            "bridge launched"
        );
    }

    fn bridge_failed(&self, error: &BridgeError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bridge_failed",
            backend = %error.backend(),
            error = %error,
            "bridge failed"
        );
    }

    fn bridge_listening(&self, spec: &BridgeSpec) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bridge_listening",
            backend = %spec.backend(),
            local_port = spec.local_port(),
            "bridge listening"
        );
    }

    fn bridge_pending(&self, spec: &BridgeSpec) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "bridge_pending",
            backend = %spec.backend(),
            local_port = spec.local_port(),
            "bridge running but not confirmed as listening"
        );
    }

    fn server_handoff(&self, command: &CommandSpec) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_handoff",
            command = %command,
            "handing off to the application server"
        );
    }

    fn startup_failed(&self, error: &OrchestratorError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "startup_failed",
            exit_code = error.exit_code(),
            error = %error,
            "startup failed"
        );
    }
}
