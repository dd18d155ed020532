//! Application server command construction.

use meshgate_config::defaults::DEFAULT_SERVER_COMMAND;

use crate::process::CommandSpec;

const PORT_PLACEHOLDER: &str = "{port}";

/// Builds the server command, substituting `{port}` in every argument and
/// exporting `PORT` to the server.
///
/// An empty `configured` command falls back to the default gunicorn/uvicorn
/// invocation of `main:app`.
#[must_use]
pub fn server_command(configured: &[String], port: u16) -> CommandSpec {
    let port_text = port.to_string();
    let substitute = |token: &str| token.replace(PORT_PLACEHOLDER, &port_text);
    let tokens: Vec<String> = if configured.is_empty() {
        DEFAULT_SERVER_COMMAND.iter().map(|token| substitute(token)).collect()
    } else {
        configured.iter().map(|token| substitute(token)).collect()
    };
    let (program, args) = tokens
        .split_first()
        .map_or((String::new(), &[][..]), |(program, args)| {
            (program.clone(), args)
        });
    CommandSpec::new(program)
        .args(args.iter().cloned())
        .env("PORT", port_text)
}
