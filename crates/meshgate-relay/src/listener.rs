//! Loopback TCP listener feeding accepted connections to a handler.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::num::NonZeroUsize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, warn};

use crate::errors::ListenerError;
use crate::handler::ConnectionHandler;

pub(crate) const LISTENER_TARGET: &str = "meshgate_relay::listener";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const LISTEN_BACKLOG: i32 = 128;

/// Bound relay socket that has not started accepting yet.
#[derive(Debug)]
pub struct RelayListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RelayListener {
    /// Binds `host:port` with address reuse enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the host does not resolve or the port
    /// cannot be bound.
    pub fn bind(host: &str, port: u16) -> Result<Self, ListenerError> {
        let (listener, local_addr) = bind_tcp(host, port)?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, including an ephemeral port.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// Connections beyond `max_connections` are closed on accept.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket cannot be
    /// switched to non-blocking mode.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        max_connections: Option<NonZeroUsize>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let limit = Arc::new(ConnectionLimit::new(max_connections));
        let local_addr = self.local_addr;
        let shutdown_flag = Arc::clone(&shutdown);
        let loop_limit = Arc::clone(&limit);
        let handle =
            thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &handler, &loop_limit));
        Ok(ListenerHandle {
            shutdown,
            limit,
            local_addr,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    limit: Arc<ConnectionLimit>,
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Address the relay is listening on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently being relayed.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.limit.active.load(Ordering::SeqCst)
    }

    /// Asks the accept loop to stop. In-flight connections keep running.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct ConnectionLimit {
    max: Option<NonZeroUsize>,
    active: AtomicUsize,
}

impl ConnectionLimit {
    const fn new(max: Option<NonZeroUsize>) -> Self {
        Self {
            max,
            active: AtomicUsize::new(0),
        }
    }

    fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        let max = self.max.map_or(usize::MAX, NonZeroUsize::get);
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max).then_some(current + 1)
            })
            .ok()?;
        Some(ConnectionPermit(Arc::clone(self)))
    }
}

/// Releases a connection slot when the connection thread finishes.
struct ConnectionPermit(Arc<ConnectionLimit>);

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &RelayListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
    limit: &Arc<ConnectionLimit>,
) {
    info!(
        target: LISTENER_TARGET,
        addr = %listener.local_addr,
        max_connections = limit.max.map(NonZeroUsize::get),
        "relay listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                dispatch(stream, handler, limit);
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "relay accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, addr = %listener.local_addr, "relay listener stopped");
}

fn dispatch(stream: TcpStream, handler: &Arc<dyn ConnectionHandler>, limit: &Arc<ConnectionLimit>) {
    let Some(permit) = limit.try_acquire() else {
        warn!(
            target: LISTENER_TARGET,
            peer = ?stream.peer_addr().ok(),
            "connection limit reached; closing connection"
        );
        return;
    };
    let handler = Arc::clone(handler);
    thread::spawn(move || {
        let _permit = permit;
        handler.handle(stream);
    });
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<TcpStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    let bind_error = |source| ListenerError::BindTcp { addr, source };
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_error)?;
    socket.set_reuse_address(true).map_err(bind_error)?;
    socket.bind(&addr.into()).map_err(bind_error)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_error)?;
    let listener: TcpListener = socket.into();
    let local_addr = listener.local_addr().map_err(bind_error)?;
    Ok((listener, local_addr))
}
