//! Forwarder process launched once per database bridge.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use meshgate_relay::RelayArgs;

fn main() -> ExitCode {
    let args = RelayArgs::parse();
    let mut stderr = io::stderr().lock();
    meshgate::run_relay(&args, &mut stderr)
}
