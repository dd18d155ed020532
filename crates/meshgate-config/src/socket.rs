use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use url::Url;

/// Local endpoint exposed by a supervised process.
///
/// The mesh daemon's control interface is a Unix domain socket while its
/// SOCKS5 proxy and every bridge listener are TCP endpoints. Endpoints are
/// written as `unix:///path` or `tcp://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketEndpoint {
    /// Filesystem socket.
    Unix {
        /// Socket file.
        path: Utf8PathBuf,
    },
    /// Host and port reached over TCP.
    Tcp {
        /// Host name or IP literal, without brackets.
        host: String,
        /// Port number.
        port: u16,
    },
}

impl SocketEndpoint {
    /// Endpoint for the socket file at `path`.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Endpoint for `host:port`.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// The loopback endpoint a bridge listens on.
    #[must_use]
    pub fn loopback(port: u16) -> Self {
        Self::tcp(crate::defaults::LOOPBACK_HOST, port)
    }

    /// Socket file, for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        if let Self::Unix { path } = self {
            Some(path)
        } else {
            None
        }
    }

    /// Host and port, for TCP endpoints.
    #[must_use]
    pub fn tcp_address(&self) -> Option<(&str, u16)> {
        if let Self::Tcp { host, port } = self {
            Some((host, *port))
        } else {
            None
        }
    }

    /// Creates the directory that will hold a Unix socket, owner-only.
    ///
    /// TCP endpoints need nothing and succeed immediately. An existing
    /// directory is left as it is.
    ///
    /// # Errors
    ///
    /// Returns [`SocketDirError`] when the socket path is a bare file name or
    /// the directory cannot be created.
    pub fn ensure_parent_dir(&self) -> Result<(), SocketDirError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => {
                return Err(SocketDirError::BareName {
                    path: path.to_owned(),
                });
            }
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o700);

        match builder.create(parent) {
            Err(source) if source.kind() != io::ErrorKind::AlreadyExists => {
                Err(SocketDirError::Create {
                    dir: parent.to_owned(),
                    source,
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input).map_err(|source| EndpointParseError::Url {
            input: input.to_owned(),
            source,
        })?;
        match url.scheme() {
            "unix" if url.path().is_empty() => Err(EndpointParseError::NoPath {
                input: input.to_owned(),
            }),
            "unix" => Ok(Self::unix(url.path())),
            "tcp" => {
                let (Some(host), Some(port)) = (url.host_str(), url.port()) else {
                    return Err(EndpointParseError::NoHostOrPort {
                        input: input.to_owned(),
                    });
                };
                // The URL parser keeps IPv6 literals bracketed.
                Ok(Self::tcp(
                    host.trim_start_matches('[').trim_end_matches(']'),
                    port,
                ))
            }
            scheme => Err(EndpointParseError::Scheme {
                input: input.to_owned(),
                scheme: scheme.to_owned(),
            }),
        }
    }
}

/// Text that does not describe a [`SocketEndpoint`].
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Not a URL at all.
    #[error("'{input}' is not an endpoint URL: {source}")]
    Url {
        /// Rejected text.
        input: String,
        /// Parser diagnostic.
        #[source]
        source: url::ParseError,
    },
    /// Neither `unix` nor `tcp`.
    #[error("'{input}' uses scheme '{scheme}'; expected unix:// or tcp://")]
    Scheme {
        /// Rejected text.
        input: String,
        /// Scheme found.
        scheme: String,
    },
    /// A `tcp://` URL without both host and port.
    #[error("'{input}' needs both a host and a port")]
    NoHostOrPort {
        /// Rejected text.
        input: String,
    },
    /// A `unix://` URL without a path.
    #[error("'{input}' names no socket file")]
    NoPath {
        /// Rejected text.
        input: String,
    },
}

/// The directory of a Unix socket could not be prepared.
#[derive(Debug, Error)]
pub enum SocketDirError {
    /// The socket path has no directory component.
    #[error("socket path '{path}' has no directory component")]
    BareName {
        /// Socket path as configured.
        path: Utf8PathBuf,
    },
    /// Creating the directory failed.
    #[error("cannot create socket directory '{dir}': {source}")]
    Create {
        /// Directory being created.
        dir: Utf8PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
}
