//! Startup orchestration: mesh first, then bridges, then the exec handoff to
//! the application server.
//!
//! The orchestrator never returns on success. After the handoff there is no
//! supervisor left: a mesh daemon or bridge that dies later is not noticed.

mod errors;

use std::convert::Infallible;
use std::sync::Arc;

use meshgate_config::Config;
use strum::Display;
use tracing::info;

use crate::bridge::{BridgeSetManager, ForwarderPlan};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::mesh::{MeshSettings, MeshSupervisor};
use crate::process::{ProcessLauncher, ServerHandoff, SystemLauncher};
use crate::readiness::{Clock, ReadinessProbe, SystemClock, SystemProbe};
use crate::server::server_command;

pub use errors::OrchestratorError;

const ORCHESTRATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::orchestrator");

/// Startup phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Configuration loaded, nothing launched.
    Init,
    /// The mesh daemon is being launched and authenticated.
    MeshStarting,
    /// The mesh is usable, or startup continues without it.
    MeshReadyOrDegraded,
    /// Bridge forwarders are being launched.
    BridgesStarting,
    /// The process is being replaced by the application server.
    ServerExec,
}

/// Collaborators shared by every startup component.
#[derive(Clone)]
pub struct Services {
    /// Starts background processes.
    pub launcher: Arc<dyn ProcessLauncher>,
    /// Time source for every wait.
    pub clock: Arc<dyn Clock>,
    /// Filesystem and network observations.
    pub probe: Arc<dyn ReadinessProbe>,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn HealthReporter>,
}

impl Services {
    /// Production collaborators.
    #[must_use]
    pub fn system() -> Self {
        Self {
            launcher: Arc::new(SystemLauncher),
            clock: Arc::new(SystemClock),
            probe: Arc::new(SystemProbe::default()),
            reporter: Arc::new(StructuredHealthReporter::new()),
        }
    }
}

/// Drives startup from configuration to the server handoff.
pub struct Orchestrator<H> {
    config: Config,
    services: Services,
    handoff: H,
}

impl<H: ServerHandoff> Orchestrator<H> {
    /// Builds an orchestrator.
    #[must_use]
    pub const fn new(config: Config, services: Services, handoff: H) -> Self {
        Self {
            config,
            services,
            handoff,
        }
    }

    /// Runs startup to completion.
    ///
    /// On success the process image is replaced and this never returns.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Mesh`] when the mesh daemon never became
    /// controllable and [`OrchestratorError::Handoff`] when the server could
    /// not be executed. Every failure is also reported to the health
    /// reporter.
    pub fn run(self) -> Result<Infallible, OrchestratorError> {
        let reporter = Arc::clone(&self.services.reporter);
        let result = self.run_phases();
        if let Err(error) = &result {
            reporter.startup_failed(error);
        }
        result
    }

    fn run_phases(self) -> Result<Infallible, OrchestratorError> {
        let Self {
            config,
            services,
            handoff,
        } = self;
        let reporter = &services.reporter;

        reporter.phase_entered(Phase::Init);
        info!(
            target: ORCHESTRATOR_TARGET,
            port = config.port(),
            forwarder = %config.forwarder(),
            "starting meshgate"
        );

        reporter.phase_entered(Phase::MeshStarting);
        let supervisor = MeshSupervisor::new(&services, MeshSettings::from_config(&config));
        let mesh = supervisor.start(config.authkey(), config.hostname_prefix())?;

        reporter.phase_entered(Phase::MeshReadyOrDegraded);
        info!(
            target: ORCHESTRATOR_TARGET,
            hostname = mesh.hostname(),
            authenticated = mesh.authenticated(),
            proxy_ready = mesh.proxy_ready(),
            "mesh client started"
        );

        reporter.phase_entered(Phase::BridgesStarting);
        let manager = BridgeSetManager::new(&services, ForwarderPlan::from_config(&config));
        let mut handles = manager.start_all(&mesh, config.bridge_specs());
        if !handles.is_empty() {
            services.clock.sleep(config.bridge_grace());
            manager.confirm_listening(&mesh, &mut handles);
        }
        info!(
            target: ORCHESTRATOR_TARGET,
            launched = handles.len(),
            listening = handles.iter().filter(|handle| handle.listening()).count(),
            "bridges started"
        );

        reporter.phase_entered(Phase::ServerExec);
        let command = server_command(config.server_command(), config.port());
        reporter.server_handoff(&command);
        let source = handoff.hand_off(&command);
        Err(OrchestratorError::Handoff {
            program: command.program().display().to_string(),
            source,
        })
    }
}
