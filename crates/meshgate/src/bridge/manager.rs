use meshgate_config::{BridgeSpec, SocketEndpoint};
use tracing::debug;

use super::{BRIDGE_TARGET, BridgeError, ForwarderPlan};
use crate::mesh::MeshConnection;
use crate::orchestrator::Services;
use crate::process::ChildProcess;

/// A launched forwarder process.
#[derive(Debug)]
pub struct BridgeHandle {
    spec: BridgeSpec,
    process: Box<dyn ChildProcess>,
    listening: bool,
}

impl BridgeHandle {
    /// Bridge this process serves.
    #[must_use]
    pub const fn spec(&self) -> &BridgeSpec {
        &self.spec
    }

    /// Process id of the forwarder.
    #[must_use]
    pub fn process_id(&self) -> u32 {
        self.process.pid()
    }

    /// Whether the bridge was confirmed to accept connections.
    #[must_use]
    pub const fn listening(&self) -> bool {
        self.listening
    }
}

/// Launches and checks the bridge forwarders.
pub struct BridgeSetManager<'a> {
    services: &'a Services,
    plan: ForwarderPlan,
}

impl<'a> BridgeSetManager<'a> {
    /// Builds a manager.
    #[must_use]
    pub const fn new(services: &'a Services, plan: ForwarderPlan) -> Self {
        Self { services, plan }
    }

    /// Launches one forwarder per enabled spec.
    ///
    /// Disabled specs are skipped and failed launches are reported; neither
    /// stops the remaining bridges. No readiness check happens here.
    pub fn start_all(&self, mesh: &MeshConnection, specs: Vec<BridgeSpec>) -> Vec<BridgeHandle> {
        let reporter = &self.services.reporter;
        let mut handles = Vec::with_capacity(specs.len());
        for spec in specs {
            let Some(remote_host) = spec.remote_host() else {
                reporter.bridge_skipped(&spec);
                continue;
            };
            match self.launch(&spec, remote_host, mesh.socks_endpoint()) {
                Ok((process, command)) => {
                    reporter.bridge_launched(&spec, process.pid(), &command);
                    handles.push(BridgeHandle {
                        spec,
                        process,
                        listening: false,
                    });
                }
                Err(error) => reporter.bridge_failed(&error),
            }
        }
        handles
    }

    fn launch(
        &self,
        spec: &BridgeSpec,
        remote_host: &str,
        proxy: &SocketEndpoint,
    ) -> Result<(Box<dyn ChildProcess>, crate::process::CommandSpec), BridgeError> {
        let command = self.plan.command(spec, remote_host, proxy)?;
        debug!(target: BRIDGE_TARGET, command = %command, "launching forwarder");
        let process = self
            .services
            .launcher
            .spawn(&command)
            .map_err(|source| BridgeError::Launch {
                backend: spec.backend(),
                source,
            })?;
        Ok((process, command))
    }

    /// Checks each handle once, after the shared grace period.
    ///
    /// A forwarder that has exited failed to bind its port. A running one is
    /// marked listening only when the mesh is authenticated, its proxy was
    /// reachable and the local port accepts connections.
    pub fn confirm_listening(&self, mesh: &MeshConnection, handles: &mut [BridgeHandle]) {
        let reporter = &self.services.reporter;
        for handle in handles.iter_mut() {
            match self.check(mesh, handle) {
                Ok(true) => {
                    handle.listening = true;
                    reporter.bridge_listening(&handle.spec);
                }
                Ok(false) => reporter.bridge_pending(&handle.spec),
                Err(error) => reporter.bridge_failed(&error),
            }
        }
    }

    fn check(
        &self,
        mesh: &MeshConnection,
        handle: &mut BridgeHandle,
    ) -> Result<bool, BridgeError> {
        let backend = handle.spec.backend();
        let exit = handle
            .process
            .try_exit()
            .map_err(|source| BridgeError::Monitor { backend, source })?;
        if let Some(exit) = exit {
            return Err(BridgeError::Bind {
                backend,
                port: handle.spec.local_port(),
                exit,
            });
        }
        if !(mesh.authenticated() && mesh.proxy_ready()) {
            return Ok(false);
        }
        Ok(self
            .services
            .probe
            .endpoint_reachable(&SocketEndpoint::loopback(handle.spec.local_port())))
    }
}
