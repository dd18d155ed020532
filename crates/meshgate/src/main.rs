//! Container entry point: joins the mesh, opens the database bridges, then
//! becomes the application server.

use std::io;
use std::process::ExitCode;

use meshgate_config::Config;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => error.exit(),
    };
    let mut stderr = io::stderr().lock();
    meshgate::run(config, &mut stderr)
}
