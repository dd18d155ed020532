use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use meshgate_config::SocketEndpoint;

use crate::process::{ChildProcess, CommandSpec, ProcessExit, ProcessLauncher, SpawnError};
use crate::readiness::ReadinessProbe;

/// Filesystem and network as seen by the code under test.
#[derive(Default)]
pub(crate) struct FakeProbe {
    paths: Mutex<HashSet<PathBuf>>,
    endpoints: Mutex<HashSet<SocketEndpoint>>,
}

impl FakeProbe {
    pub fn add_path(&self, path: impl Into<PathBuf>) {
        self.paths
            .lock()
            .expect("probe mutex poisoned")
            .insert(path.into());
    }

    pub fn open_endpoint(&self, endpoint: SocketEndpoint) {
        self.endpoints
            .lock()
            .expect("probe mutex poisoned")
            .insert(endpoint);
    }
}

impl ReadinessProbe for FakeProbe {
    fn path_exists(&self, path: &Path) -> bool {
        self.paths.lock().expect("probe mutex poisoned").contains(path)
    }

    fn endpoint_reachable(&self, endpoint: &SocketEndpoint) -> bool {
        self.endpoints
            .lock()
            .expect("probe mutex poisoned")
            .contains(endpoint)
    }
}

/// How a scripted program behaves once spawned.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Behaviour {
    /// Keeps running forever.
    Runs,
    /// Has already exited with the given status when first polled.
    ExitsWith(i32),
    /// Cannot be started at all.
    FailsToSpawn(io::ErrorKind),
}

/// World change caused by a successful spawn.
#[derive(Debug, Clone)]
pub(crate) enum SideEffect {
    CreatePath(PathBuf),
    OpenEndpoint(SocketEndpoint),
}

struct Script {
    program: String,
    argument: Option<String>,
    behaviour: Behaviour,
    effects: Vec<SideEffect>,
}

impl Script {
    fn matches(&self, command: &CommandSpec) -> bool {
        command.program_name() == self.program
            && self.argument.as_ref().is_none_or(|needle| {
                command
                    .arguments()
                    .iter()
                    .any(|argument| argument.contains(needle.as_str()))
            })
    }
}

/// Launcher that fakes processes by program name.
///
/// Unscripted programs keep running and change nothing. Later scripts take
/// precedence over earlier ones.
pub(crate) struct ScriptedLauncher {
    probe: Arc<FakeProbe>,
    scripts: Mutex<Vec<Script>>,
    spawned: Mutex<Vec<CommandSpec>>,
    next_pid: AtomicU32,
}

impl ScriptedLauncher {
    pub fn new(probe: Arc<FakeProbe>) -> Self {
        Self {
            probe,
            scripts: Mutex::new(Vec::new()),
            spawned: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(100),
        }
    }

    pub fn script(&self, program: &str, behaviour: Behaviour, effects: Vec<SideEffect>) {
        self.push(program, None, behaviour, effects);
    }

    /// Scripts only invocations with an argument containing `argument`.
    pub fn script_matching(
        &self,
        program: &str,
        argument: &str,
        behaviour: Behaviour,
        effects: Vec<SideEffect>,
    ) {
        self.push(program, Some(argument.to_owned()), behaviour, effects);
    }

    fn push(
        &self,
        program: &str,
        argument: Option<String>,
        behaviour: Behaviour,
        effects: Vec<SideEffect>,
    ) {
        self.scripts
            .lock()
            .expect("launcher mutex poisoned")
            .push(Script {
                program: program.to_owned(),
                argument,
                behaviour,
                effects,
            });
    }

    /// Every command passed to `spawn`, including failed ones.
    pub fn spawned(&self) -> Vec<CommandSpec> {
        self.spawned.lock().expect("launcher mutex poisoned").clone()
    }

    /// Spawned commands whose program file name is `program`.
    pub fn spawned_named(&self, program: &str) -> Vec<CommandSpec> {
        self.spawned()
            .into_iter()
            .filter(|command| command.program_name() == program)
            .collect()
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, SpawnError> {
        self.spawned
            .lock()
            .expect("launcher mutex poisoned")
            .push(command.clone());

        let (behaviour, effects) = {
            let scripts = self.scripts.lock().expect("launcher mutex poisoned");
            scripts
                .iter()
                .rev()
                .find(|script| script.matches(command))
                .map_or((Behaviour::Runs, Vec::new()), |script| {
                    (script.behaviour, script.effects.clone())
                })
        };

        let exit = match behaviour {
            Behaviour::FailsToSpawn(kind) => {
                return Err(SpawnError {
                    program: command.program().display().to_string(),
                    source: io::Error::new(kind, "scripted spawn failure"),
                });
            }
            Behaviour::Runs => None,
            Behaviour::ExitsWith(code) => Some(ProcessExit::from_code(Some(code))),
        };
        for effect in effects {
            match effect {
                SideEffect::CreatePath(path) => self.probe.add_path(path),
                SideEffect::OpenEndpoint(endpoint) => self.probe.open_endpoint(endpoint),
            }
        }
        Ok(Box::new(FakeChild {
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
            exit,
        }))
    }
}

#[derive(Debug)]
struct FakeChild {
    pid: u32,
    exit: Option<ProcessExit>,
}

impl ChildProcess for FakeChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn try_exit(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.exit)
    }
}
