//! Installs the global `tracing` subscriber for the supervisor and the relay.
//!
//! Events always go to stderr: stdout is inherited by the application server
//! once the supervisor hands off.

use std::io::{self, IsTerminal};

use meshgate_config::{LogFormat, LogSettings};
use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Proof that the global subscriber is in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Telemetry could not be set up.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter expression does not parse.
    #[error("log filter '{filter}' is invalid: {reason}")]
    InvalidFilter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// Another global subscriber was installed first.
    #[error("cannot install log subscriber: {0}")]
    Install(#[source] SetGlobalDefaultError),
}

/// Installs the subscriber described by `settings`.
///
/// Only the first successful call has an effect; later calls return a handle
/// and leave the installed subscriber alone.
///
/// # Errors
///
/// Returns [`TelemetryError`] for an unparsable filter or when a foreign
/// subscriber already owns the global slot.
pub fn initialise(settings: &LogSettings) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED.get_or_try_init(|| install(settings))?;
    Ok(TelemetryHandle)
}

fn install(settings: &LogSettings) -> Result<(), TelemetryError> {
    let filter = parse_filter(settings.filter())?;
    let output = match settings.format() {
        LogFormat::Json => fmt::layer()
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .with_ansi(io::stderr().is_terminal())
            .compact()
            .boxed(),
    };
    let subscriber = Registry::default().with(output).with(filter);
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Install)
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::InvalidFilter {
        filter: expression.to_owned(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_are_rejected() {
        let error = parse_filter("meshgate=loud").expect_err("level should not parse");
        let TelemetryError::InvalidFilter { filter, .. } = &error else {
            panic!("unexpected error: {error:?}");
        };
        assert_eq!(filter, "meshgate=loud");
        assert!(error.to_string().contains("meshgate=loud"));
    }

    #[test]
    fn per_target_directives_parse() {
        parse_filter("info,meshgate::mesh=debug").expect("valid filter");
    }
}
