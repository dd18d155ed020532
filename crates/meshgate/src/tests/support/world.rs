use std::io;

use camino::Utf8PathBuf;
use meshgate_config::{Config, SocketEndpoint};
use tempfile::TempDir;

use super::{Behaviour, Fakes, RecordingHandoff, SideEffect};
use crate::orchestrator::{Orchestrator, OrchestratorError};

pub(crate) const SOCKS_PORT: u16 = 1055;
pub(crate) const RELAY_BIN: &str = "/opt/meshgate/meshgate-relay";

/// Scenario world: one full startup run against fake processes and
/// virtual time.
pub(crate) struct StartupWorld {
    dir: TempDir,
    pub fakes: Fakes,
    pub handoff: RecordingHandoff,
    args: Vec<String>,
    authkey: String,
    daemon: Behaviour,
    daemon_creates_socket: bool,
    socks_listens: bool,
    auth: Behaviour,
    outcome: Option<OrchestratorError>,
}

impl StartupWorld {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temporary directory"),
            fakes: Fakes::new(),
            handoff: RecordingHandoff::default(),
            args: Vec::new(),
            authkey: "tskey-test".to_owned(),
            daemon: Behaviour::Runs,
            daemon_creates_socket: true,
            socks_listens: true,
            auth: Behaviour::ExitsWith(0),
            outcome: None,
        }
    }

    pub fn socket_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join("tailscaled.sock"))
            .expect("temporary socket path was not valid UTF-8")
    }

    pub fn socks_endpoint() -> SocketEndpoint {
        SocketEndpoint::loopback(SOCKS_PORT)
    }

    /// Appends `--{flag} {value}` to the command line.
    pub fn set(&mut self, flag: &str, value: &str) {
        self.args.push(format!("--{flag}"));
        self.args.push(value.to_owned());
    }

    pub fn without_credential(&mut self) {
        self.authkey.clear();
    }

    pub fn daemon_fails_to_launch(&mut self) {
        self.daemon = Behaviour::FailsToSpawn(io::ErrorKind::NotFound);
    }

    pub fn daemon_never_creates_socket(&mut self) {
        self.daemon_creates_socket = false;
    }

    pub fn socks_never_listens(&mut self) {
        self.socks_listens = false;
    }

    pub fn auth_rejected(&mut self) {
        self.auth = Behaviour::ExitsWith(1);
    }

    pub fn config(&self) -> Config {
        let socket = self.socket_path();
        let state = self.dir.path().join("tailscaled.state");
        let mut argv = vec![
            "meshgate".to_owned(),
            "--authkey".to_owned(),
            self.authkey.clone(),
            "--mesh-socket".to_owned(),
            socket.to_string(),
            "--mesh-state".to_owned(),
            state.display().to_string(),
            "--socks-endpoint".to_owned(),
            Self::socks_endpoint().to_string(),
            "--relay-bin".to_owned(),
            RELAY_BIN.to_owned(),
        ];
        argv.extend(self.args.iter().cloned());
        Config::load_from_iter(argv).expect("configuration should load")
    }

    /// Scripts the fakes, then runs startup to the handoff.
    pub fn run(&mut self) {
        let config = self.prepare();
        let orchestrator =
            Orchestrator::new(config, self.fakes.services(), self.handoff.clone());
        self.outcome = orchestrator.run().err();
    }

    /// Scripts the fakes for the configured scenario and returns the
    /// configuration to run with.
    pub fn prepare(&self) -> Config {
        let config = self.config();
        let mut daemon_effects = Vec::new();
        if self.daemon_creates_socket {
            daemon_effects.push(SideEffect::CreatePath(self.socket_path().into_std_path_buf()));
        }
        if self.socks_listens {
            daemon_effects.push(SideEffect::OpenEndpoint(Self::socks_endpoint()));
        }
        let launcher = &self.fakes.launcher;
        launcher.script("tailscaled", self.daemon, daemon_effects);
        launcher.script("tailscale", self.auth, Vec::new());
        for spec in config.bridge_specs() {
            launcher.script_matching(
                "meshgate-relay",
                &spec.local_port().to_string(),
                Behaviour::Runs,
                vec![SideEffect::OpenEndpoint(SocketEndpoint::loopback(
                    spec.local_port(),
                ))],
            );
        }
        config
    }

    pub fn outcome(&self) -> Option<&OrchestratorError> {
        self.outcome.as_ref()
    }

    pub fn exit_code(&self) -> Option<u8> {
        self.outcome().map(OrchestratorError::exit_code)
    }
}
