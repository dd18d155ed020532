//! Fakes and fixtures shared by the unit and behavioural suites.

mod clock;
mod launcher;
mod reporter;
mod world;

use std::sync::Arc;

pub(crate) use clock::ManualClock;
pub(crate) use launcher::{Behaviour, FakeProbe, ScriptedLauncher, SideEffect};
pub(crate) use reporter::{HealthEvent, RecordingHandoff, RecordingReporter};
pub(crate) use world::StartupWorld;

use crate::orchestrator::Services;

/// Fake collaborators wired together: launched processes can create paths
/// and open endpoints the probe then observes.
pub(crate) struct Fakes {
    pub clock: Arc<ManualClock>,
    pub probe: Arc<FakeProbe>,
    pub launcher: Arc<ScriptedLauncher>,
    pub reporter: Arc<RecordingReporter>,
}

impl Fakes {
    pub fn new() -> Self {
        let probe = Arc::new(FakeProbe::default());
        Self {
            clock: Arc::new(ManualClock::new()),
            launcher: Arc::new(ScriptedLauncher::new(Arc::clone(&probe))),
            probe,
            reporter: Arc::new(RecordingReporter::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            launcher: self.launcher.clone(),
            clock: self.clock.clone(),
            probe: self.probe.clone(),
            reporter: self.reporter.clone(),
        }
    }
}
