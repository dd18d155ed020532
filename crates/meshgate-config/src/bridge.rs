//! Declarative description of the database bridges.
//!
//! Each recognised database backend owns one fixed local port and one fixed
//! remote port. A backend's bridge is enabled by configuring its remote host;
//! without a host the spec still exists but is never launched.

use strum::{Display, EnumString};
use thiserror::Error;

/// Database backends reachable through a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DatabaseBackend {
    /// Microsoft SQL Server.
    Mssql,
    /// PostgreSQL.
    Postgres,
    /// MySQL or MariaDB.
    Mysql,
    /// MongoDB.
    Mongodb,
}

impl DatabaseBackend {
    /// Every backend, in launch order.
    pub const ALL: [Self; 4] = [Self::Mssql, Self::Postgres, Self::Mysql, Self::Mongodb];

    /// Port the backend listens on, used both locally and remotely.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Mssql => 1433,
            Self::Postgres => 5432,
            Self::Mysql => 3306,
            Self::Mongodb => 27017,
        }
    }

    /// Environment variable naming the remote host of the backend.
    #[must_use]
    pub const fn remote_host_env(self) -> &'static str {
        match self {
            Self::Mssql => "MSSQL_REMOTE_IP",
            Self::Postgres => "POSTGRES_REMOTE_IP",
            Self::Mysql => "MYSQL_REMOTE_IP",
            Self::Mongodb => "MONGODB_REMOTE_IP",
        }
    }
}

/// One TCP tunnel from a loopback port to a host inside the mesh.
///
/// Immutable once built. `enabled` is derived from the presence of a remote
/// host rather than stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSpec {
    backend: DatabaseBackend,
    local_port: u16,
    remote_host: Option<String>,
    remote_port: u16,
}

impl BridgeSpec {
    /// Builds a bridge spec, validating both ports.
    ///
    /// A remote host that is blank after trimming counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeSpecError::ZeroPort`] when either port is zero.
    pub fn new(
        backend: DatabaseBackend,
        local_port: u16,
        remote_host: Option<&str>,
        remote_port: u16,
    ) -> Result<Self, BridgeSpecError> {
        if local_port == 0 {
            return Err(BridgeSpecError::ZeroPort {
                backend,
                field: "local_port",
            });
        }
        if remote_port == 0 {
            return Err(BridgeSpecError::ZeroPort {
                backend,
                field: "remote_port",
            });
        }
        Ok(Self {
            backend,
            local_port,
            remote_host: normalise_host(remote_host),
            remote_port,
        })
    }

    /// Builds the spec for a backend using its fixed ports.
    #[must_use]
    pub fn for_backend(backend: DatabaseBackend, remote_host: Option<&str>) -> Self {
        let port = backend.default_port();
        Self {
            backend,
            local_port: port,
            remote_host: normalise_host(remote_host),
            remote_port: port,
        }
    }

    /// Backend this bridge serves.
    #[must_use]
    pub const fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Loopback port the bridge listens on.
    #[must_use]
    pub const fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Remote host inside the mesh, when configured.
    #[must_use]
    pub fn remote_host(&self) -> Option<&str> {
        self.remote_host.as_deref()
    }

    /// Port on the remote host.
    #[must_use]
    pub const fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Whether the bridge should be launched.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.remote_host.is_some()
    }
}

fn normalise_host(host: Option<&str>) -> Option<String> {
    host.map(str::trim)
        .filter(|host| !host.is_empty())
        .map(ToOwned::to_owned)
}

/// Errors raised while building a [`BridgeSpec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeSpecError {
    /// A port was zero.
    #[error("{backend} bridge {field} must be between 1 and 65535")]
    ZeroPort {
        /// Backend the spec was built for.
        backend: DatabaseBackend,
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Program used to forward bridge traffic through the SOCKS5 proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ForwarderKind {
    /// The bundled `meshgate-relay` binary.
    #[default]
    Relay,
    /// An external `socat` with SOCKS5 support.
    Socat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DatabaseBackend::Mssql, 1433)]
    #[case(DatabaseBackend::Postgres, 5432)]
    #[case(DatabaseBackend::Mysql, 3306)]
    #[case(DatabaseBackend::Mongodb, 27017)]
    fn backends_use_fixed_ports(#[case] backend: DatabaseBackend, #[case] port: u16) {
        let spec = BridgeSpec::for_backend(backend, Some("10.0.0.5"));
        assert_eq!(spec.local_port(), port);
        assert_eq!(spec.remote_port(), port);
    }

    #[rstest]
    #[case::absent(None)]
    #[case::empty(Some(""))]
    #[case::blank(Some("   "))]
    fn missing_hosts_disable_the_bridge(#[case] host: Option<&str>) {
        let spec = BridgeSpec::for_backend(DatabaseBackend::Postgres, host);
        assert!(!spec.enabled());
        assert_eq!(spec.remote_host(), None);
    }

    #[test]
    fn hosts_are_trimmed() {
        let spec = BridgeSpec::for_backend(DatabaseBackend::Mssql, Some(" 10.0.0.5\n"));
        assert!(spec.enabled());
        assert_eq!(spec.remote_host(), Some("10.0.0.5"));
    }

    #[test]
    fn zero_ports_are_rejected() {
        let error = BridgeSpec::new(DatabaseBackend::Mysql, 0, Some("db"), 3306)
            .expect_err("zero local port");
        assert_eq!(
            error,
            BridgeSpecError::ZeroPort {
                backend: DatabaseBackend::Mysql,
                field: "local_port",
            }
        );
    }

    #[test]
    fn forwarder_kind_parses_names() {
        assert_eq!("socat".parse::<ForwarderKind>(), Ok(ForwarderKind::Socat));
        assert!("netcat".parse::<ForwarderKind>().is_err());
    }
}
