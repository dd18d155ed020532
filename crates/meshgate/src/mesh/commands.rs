//! Command lines for the mesh daemon and its control CLI.

use rand::Rng;

use meshgate_config::SocketEndpoint;

use super::MeshSettings;
use crate::process::CommandSpec;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 6;

/// `tailscaled`-style daemon invocation in userspace networking mode.
pub(super) fn daemon_command(settings: &MeshSettings) -> CommandSpec {
    CommandSpec::new(&settings.daemon)
        .arg("--tun=userspace-networking")
        .arg(format!("--socks5-server={}", listen_address(&settings.socks)))
        .arg(format!("--socket={}", settings.socket_path))
        .arg(format!("--state={}", settings.state_path.display()))
}

/// `tailscale up` invocation; the auth key is a secret argument.
pub(super) fn up_command(settings: &MeshSettings, credential: &str, hostname: &str) -> CommandSpec {
    CommandSpec::new(&settings.cli)
        .arg(format!("--socket={}", settings.socket_path))
        .arg("up")
        .secret_arg("--authkey=", credential)
        .arg(format!("--hostname={hostname}"))
        .arg("--accept-routes")
        .arg("--ssh")
}

/// Random lowercase alphanumeric token that keeps concurrent instances from
/// claiming the same mesh hostname.
pub(super) fn identity_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .filter_map(|_| SUFFIX_ALPHABET.get(rng.gen_range(0..SUFFIX_ALPHABET.len())))
        .map(|byte| char::from(*byte))
        .collect()
}

fn listen_address(endpoint: &SocketEndpoint) -> String {
    match endpoint.tcp_address() {
        Some((host, port)) if host.contains(':') => format!("[{host}]:{port}"),
        Some((host, port)) => format!("{host}:{port}"),
        None => endpoint.to_string(),
    }
}
