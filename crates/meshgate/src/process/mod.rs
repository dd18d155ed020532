//! Child-process plumbing: command descriptions, launching, the exec handoff
//! and termination signals.

mod command;
mod handoff;
mod launcher;
mod shutdown;

pub use command::CommandSpec;
pub use handoff::{ExecHandoff, ServerHandoff};
pub use launcher::{ChildProcess, ProcessExit, ProcessLauncher, SpawnError, SystemLauncher};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
