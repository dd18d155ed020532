//! Command-line contract between the bridge manager and the relay binary.

use std::num::NonZeroUsize;

use clap::Parser;
use meshgate_config::defaults::{DEFAULT_LOG_FILTER, LOOPBACK_HOST};
use meshgate_config::{LogFormat, LogSettings, SocketEndpoint};

/// Arguments accepted by the `meshgate-relay` binary.
///
/// The bridge manager renders these with [`RelayArgs::to_arguments`], so the
/// flags it emits are exactly the flags the relay parses.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "meshgate-relay",
    version,
    about = "Forwards loopback TCP connections through a SOCKS5 proxy"
)]
pub struct RelayArgs {
    /// Interface the relay listens on.
    #[arg(long, default_value = LOOPBACK_HOST)]
    pub listen_host: String,

    /// Port the relay listens on.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub listen_port: u16,

    /// Host to reach through the proxy.
    #[arg(long)]
    pub target_host: String,

    /// Port to reach through the proxy.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub target_port: u16,

    /// SOCKS5 proxy endpoint, e.g. `tcp://127.0.0.1:1055`.
    #[arg(long)]
    pub proxy: SocketEndpoint,

    /// Concurrent connection cap; unbounded when unset.
    #[arg(long)]
    pub max_connections: Option<NonZeroUsize>,

    /// `tracing` filter expression.
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format.
    #[arg(long, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl RelayArgs {
    /// Renders the arguments as flags, without the program name.
    #[must_use]
    pub fn to_arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            "--listen-host".to_owned(),
            self.listen_host.clone(),
            "--listen-port".to_owned(),
            self.listen_port.to_string(),
            "--target-host".to_owned(),
            self.target_host.clone(),
            "--target-port".to_owned(),
            self.target_port.to_string(),
            "--proxy".to_owned(),
            self.proxy.to_string(),
        ];
        if let Some(limit) = self.max_connections {
            arguments.push("--max-connections".to_owned());
            arguments.push(limit.to_string());
        }
        arguments.extend([
            "--log-filter".to_owned(),
            self.log_filter.clone(),
            "--log-format".to_owned(),
            self.log_format.to_string(),
        ]);
        arguments
    }

    /// Logging filter and format.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings::new(self.log_filter.clone(), self.log_format)
    }
}
