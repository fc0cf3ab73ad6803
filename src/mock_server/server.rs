//! Mock package registry server.
//!
//! A single background task accepts connections and serves each one to
//! completion before accepting the next, so handlers never run concurrently.

use std::convert::Infallible;
use std::error::Error as _;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use super::abort::is_listener_abort;
use super::dispatch;
use super::handler::{HandlerResult, MockRequest};
use super::response::MockResponse;
use super::state::MockState;
use crate::config::MockServerConfig;
use crate::error::{MockServerError, Result};
use crate::port::PortReservation;

/// How long a client may take to send its request head.
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an open connection may keep running once shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Where a [`MockServer`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Listening,
    Stopped,
    Disposed,
}

impl Lifecycle {
    fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Listening => "listening",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        }
    }
}

enum Slot {
    Created,
    Listening {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<Result<()>>,
    },
    Stopped,
    Disposed,
}

impl Slot {
    fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::Created => Lifecycle::Created,
            Self::Listening { .. } => Lifecycle::Listening,
            Self::Stopped => Lifecycle::Stopped,
            Self::Disposed => Lifecycle::Disposed,
        }
    }
}

/// A programmable mock package registry for tests.
///
/// Every route lives under a random base path, so servers running side by
/// side in one test process never answer each other's requests.
///
/// # Example
///
/// ```no_run
/// use mockfeed::mock_server::MockServer;
///
/// # async fn example() -> mockfeed::Result<()> {
/// let server = MockServer::new()?;
/// server.get("/packages/foo", |_| "ok");
/// server.start().await?;
///
/// let url = format!("{}/packages/foo", server.url());
/// // ... point the client under test at `url` ...
///
/// server.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct MockServer {
    state: Arc<MockState>,
    url: String,
    reservation: Mutex<Option<PortReservation>>,
    slot: AsyncMutex<Slot>,
    teardown_faults: Mutex<Vec<MockServerError>>,
}

impl MockServer {
    /// Create a server with default settings. Nothing listens until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be reserved.
    pub fn new() -> Result<Self> {
        Self::with_config(MockServerConfig::default())
    }

    /// Create a server from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no port can be reserved.
    pub fn with_config(config: MockServerConfig) -> Result<Self> {
        config.validate()?;
        let warning_header = config.warning_header_name()?;
        let base_path = config.resolve_base_path();
        let reservation = PortReservation::reserve(config.host)?;
        let url = format!(
            "{}{}",
            reservation.base_url().as_str().trim_end_matches('/'),
            base_path
        );

        Ok(Self {
            state: MockState::new(base_path, warning_header).shared(),
            url,
            reservation: Mutex::new(Some(reservation)),
            slot: AsyncMutex::new(Slot::Created),
            teardown_faults: Mutex::default(),
        })
    }

    /// Create and start a server with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind.
    pub async fn launch() -> Result<Self> {
        let server = Self::new()?;
        server.start().await?;
        Ok(server)
    }

    /// The server URL including the base path, without a trailing slash.
    ///
    /// Append registered patterns to it to build request URLs.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The base path every route is registered under.
    pub fn base_path(&self) -> &str {
        self.state.base_path()
    }

    /// Shared routing state.
    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    /// Current lifecycle state.
    pub async fn lifecycle(&self) -> Lifecycle {
        self.slot.lock().await.lifecycle()
    }

    /// Register a GET route.
    pub fn get<F, R>(&self, pattern: &str, handler: F)
    where
        F: Fn(&MockRequest) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        self.state.add_route(&Method::GET, pattern, handler);
    }

    /// Register a PUT route.
    pub fn put<F, R>(&self, pattern: &str, handler: F)
    where
        F: Fn(&MockRequest) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        self.state.add_route(&Method::PUT, pattern, handler);
    }

    /// Register a DELETE route.
    pub fn delete<F, R>(&self, pattern: &str, handler: F)
    where
        F: Fn(&MockRequest) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        self.state.add_route(&Method::DELETE, pattern, handler);
    }

    /// Add a warning sent on every matched response from now on.
    pub fn add_warning(&self, warning: impl Into<String>) {
        self.state.add_warning(warning.into());
    }

    /// Warnings added so far, in order.
    pub fn warnings(&self) -> Vec<String> {
        self.state.warnings()
    }

    /// Observe every request/response pair after the response has been written.
    pub fn set_request_observer<F>(&self, observer: F)
    where
        F: Fn(&MockRequest, &MockResponse) + Send + Sync + 'static,
    {
        self.state.set_observer(Arc::new(observer));
    }

    /// Bind the reserved port and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server has already been started, stopped or
    /// disposed, or if the listener cannot be set up.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if !matches!(*slot, Slot::Created) {
            return Err(MockServerError::InvalidState {
                operation: "start",
                state: slot.lifecycle().as_str(),
            });
        }

        let listener = self
            .reservation
            .lock()
            .as_mut()
            .and_then(PortReservation::take_listener)
            .ok_or_else(|| {
                MockServerError::Bind(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "port reservation already released",
                ))
            })?;
        listener.set_nonblocking(true).map_err(MockServerError::Bind)?;
        let listener = TcpListener::from_std(listener).map_err(MockServerError::Bind)?;

        *slot = self.spawn_accept_loop(listener);
        tracing::info!(url = %self.url, "mock server listening");
        Ok(())
    }

    fn spawn_accept_loop<A: Acceptor>(&self, listener: A) -> Slot {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&self.state), signal));
        Slot::Listening { shutdown, task }
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// A request being served when this is called gets a short grace period
    /// to complete; idle or stalled connections are closed. Calling this
    /// again, or on a server that never started, does nothing.
    ///
    /// # Errors
    ///
    /// Returns the fault that ended the accept loop, if it failed.
    pub async fn stop(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let (shutdown, task) = match std::mem::replace(&mut *slot, Slot::Stopped) {
            Slot::Listening { shutdown, task } => (shutdown, task),
            other => {
                *slot = other;
                return Ok(());
            }
        };

        // The loop may already have exited on a fault, dropping the receiver.
        let _ = shutdown.send(true);
        let result = match task.await {
            Ok(result) => result,
            Err(err) => Err(MockServerError::LoopPanicked(err.to_string())),
        };

        tracing::info!(url = %self.url, "mock server stopped");
        result
    }

    /// Stop the server and release its port.
    ///
    /// Faults raised while tearing down are logged and kept in
    /// [`teardown_faults`](Self::teardown_faults) instead of being returned,
    /// so they never mask a test failure. Calling this again does nothing.
    pub async fn dispose(&self) {
        if let Err(err) = self.stop().await {
            tracing::error!(error = %err, "mock server faulted before dispose");
            self.teardown_faults.lock().push(err);
        }

        let mut slot = self.slot.lock().await;
        if matches!(*slot, Slot::Disposed) {
            return;
        }
        *slot = Slot::Disposed;
        drop(self.reservation.lock().take());
        tracing::debug!(url = %self.url, "mock server disposed");
    }

    /// Faults recorded by [`dispose`](Self::dispose), oldest first.
    pub fn teardown_faults(&self) -> Vec<String> {
        self.teardown_faults
            .lock()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        // Best effort: the loop cannot be awaited here.
        if let Slot::Listening { shutdown, task } =
            std::mem::replace(self.slot.get_mut(), Slot::Disposed)
        {
            let _ = shutdown.send(true);
            task.abort();
            tracing::debug!(url = %self.url, "mock server dropped while listening");
        }
    }
}

/// Source of inbound connections for the accept loop.
trait Acceptor: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Resolves once shutdown has been signalled or the server handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A closed channel means the sender was dropped, which also ends the loop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Accept connections until shutdown is signalled or the listener is aborted.
async fn accept_loop<A: Acceptor>(
    listener: A,
    state: Arc<MockState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        let (stream, peer) = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => {
                tracing::debug!("accept loop shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => return classify_accept_error(err),
            },
        };

        tracing::debug!(%peer, "accepted connection");
        serve_connection(stream, &state, &mut shutdown).await?;
    }
}

/// Decide how the accept loop ends after `accept` failed.
///
/// Intentional aborts end it cleanly; anything else is a listener fault.
fn classify_accept_error(err: io::Error) -> Result<()> {
    if is_listener_abort(&err) {
        tracing::debug!(error = %err, "listener aborted");
        Ok(())
    } else {
        tracing::error!(error = %err, "listener failed");
        Err(MockServerError::Listener(err))
    }
}

/// Serve one connection to completion, then notify the observer.
///
/// Shutdown interrupts the connection: it is asked to finish gracefully and
/// dropped if it is still open after [`SHUTDOWN_GRACE`].
#[tracing::instrument(skip_all, fields(peer = ?stream.peer_addr().ok()))]
async fn serve_connection(
    stream: TcpStream,
    state: &Arc<MockState>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let exchanges: Arc<Mutex<Vec<(MockRequest, MockResponse)>>> = Arc::default();

    let service = {
        let state = Arc::clone(state);
        let exchanges = Arc::clone(&exchanges);
        service_fn(move |request: Request<Incoming>| {
            let state = Arc::clone(&state);
            let exchanges = Arc::clone(&exchanges);
            async move {
                let request = dispatch::buffer_request(request.map(Body::new)).await;
                let response = dispatch::respond(&state, &request);
                let http = response.to_http();
                exchanges.lock().push((request, response));
                Ok::<_, Infallible>(http)
            }
        })
    };

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT)
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let served = tokio::select! {
        served = connection.as_mut() => served,
        () = shutdown_requested(shutdown) => {
            connection.as_mut().graceful_shutdown();
            match tokio::time::timeout(SHUTDOWN_GRACE, connection.as_mut()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::debug!(error = %err, "connection ended during shutdown"),
                Err(_) => tracing::debug!("dropping connection still open at shutdown"),
            }
            Ok(())
        }
    };

    if let Err(err) = served {
        if is_peer_disconnect(&err) {
            tracing::debug!(error = %err, "peer went away while writing response");
        } else if err.is_timeout() {
            tracing::warn!(error = %err, "client did not send a request in time");
        } else if err.is_parse() || err.is_user() {
            tracing::warn!(error = %err, "malformed request");
        } else {
            tracing::error!(error = %err, "failed to write response");
            return Err(err.into());
        }
    }

    let exchanges = std::mem::take(&mut *exchanges.lock());
    for (request, response) in &exchanges {
        state.notify(request, response);
    }
    Ok(())
}

/// Whether a connection error means the client hung up.
fn is_peer_disconnect(err: &hyper::Error) -> bool {
    if err.is_incomplete_message() || err.is_canceled() || err.is_closed() {
        return true;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return matches!(
                io_err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            );
        }
        source = cause.source();
    }
    false
}
