use std::io;
use std::sync::{Arc, Mutex};

use meshgate_config::{BridgeSpec, DatabaseBackend, SocketEndpoint};

use crate::bridge::BridgeError;
use crate::health::HealthReporter;
use crate::mesh::AuthFailure;
use crate::orchestrator::{OrchestratorError, Phase};
use crate::process::{CommandSpec, ServerHandoff};
use crate::readiness::{PollReport, ReadinessTimeout};

/// Recorded lifecycle event, reduced to what assertions compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthEvent {
    Phase(Phase),
    DaemonLaunched(String),
    Authenticated(String),
    AuthFailed(String),
    ProxyReady,
    ProxyDegraded,
    BridgeSkipped(DatabaseBackend),
    BridgeLaunched(DatabaseBackend),
    BridgeFailed(DatabaseBackend, String),
    BridgeListening(DatabaseBackend),
    BridgePending(DatabaseBackend),
    ServerHandoff(String),
    StartupFailed(String),
}

/// Records health events for assertions.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::Phase(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, expected: &HealthEvent) -> bool {
        self.events().contains(expected)
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingReporter {
    fn phase_entered(&self, phase: Phase) {
        self.record(HealthEvent::Phase(phase));
    }

    fn mesh_daemon_launched(&self, _pid: u32, command: &CommandSpec) {
        self.record(HealthEvent::DaemonLaunched(command.to_string()));
    }

    fn mesh_authenticated(&self, hostname: &str) {
        self.record(HealthEvent::Authenticated(hostname.to_owned()));
    }

    fn mesh_auth_failed(&self, failure: &AuthFailure) {
        self.record(HealthEvent::AuthFailed(failure.to_string()));
    }

    fn proxy_ready(&self, _endpoint: &SocketEndpoint, _report: &PollReport) {
        self.record(HealthEvent::ProxyReady);
    }

    fn proxy_degraded(&self, _endpoint: &SocketEndpoint, _timeout: &ReadinessTimeout) {
        self.record(HealthEvent::ProxyDegraded);
    }

    fn bridge_skipped(&self, spec: &BridgeSpec) {
        self.record(HealthEvent::BridgeSkipped(spec.backend()));
    }

    fn bridge_launched(&self, spec: &BridgeSpec, _pid: u32, _command: &CommandSpec) {
        self.record(HealthEvent::BridgeLaunched(spec.backend()));
    }

    fn bridge_failed(&self, error: &BridgeError) {
        self.record(HealthEvent::BridgeFailed(error.backend(), error.to_string()));
    }

    fn bridge_listening(&self, spec: &BridgeSpec) {
        self.record(HealthEvent::BridgeListening(spec.backend()));
    }

    fn bridge_pending(&self, spec: &BridgeSpec) {
        self.record(HealthEvent::BridgePending(spec.backend()));
    }

    fn server_handoff(&self, command: &CommandSpec) {
        self.record(HealthEvent::ServerHandoff(command.program_name()));
    }

    fn startup_failed(&self, error: &OrchestratorError) {
        self.record(HealthEvent::StartupFailed(error.to_string()));
    }
}

/// Handoff that records the server command and fails as if the program
/// were missing.
#[derive(Clone, Default)]
pub(crate) struct RecordingHandoff {
    commands: Arc<Mutex<Vec<CommandSpec>>>,
}

impl RecordingHandoff {
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().expect("handoff mutex poisoned").clone()
    }
}

impl ServerHandoff for RecordingHandoff {
    fn hand_off(&self, command: &CommandSpec) -> io::Error {
        self.commands
            .lock()
            .expect("handoff mutex poisoned")
            .push(command.clone());
        io::Error::new(io::ErrorKind::NotFound, "recorded handoff")
    }
}
