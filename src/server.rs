//! Control Plane HTTP Server
//!
//! Owns the listener for the control API. The accept loop and a shutdown
//! watcher run side by side; the first error from either ends the server.
//! On cancellation the listener is closed, open connections are asked to
//! finish their in-flight request, and whatever is still open when the
//! shutdown deadline passes is aborted.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::Http;
use hyper::service::service_fn;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{api_error, ControlApi};
use crate::config::HttpConfig;
use crate::error::{ApiError, ControlError};

/// Pause after a transient accept failure
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Lifecycle of the control server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

/// Per-connection and shutdown time limits
#[derive(Debug, Clone, Copy)]
pub struct ServerTimeouts {
    /// Time allowed to receive request headers
    pub read: Duration,
    /// Keep-alive connections with no request in flight close after this
    pub idle: Duration,
    /// Deadline for producing a response
    pub write: Duration,
    /// How long shutdown waits for open connections
    pub shutdown: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(5),
            idle: Duration::from_secs(10),
            write: Duration::from_secs(10),
            shutdown: Duration::from_secs(10),
        }
    }
}

impl From<&HttpConfig> for ServerTimeouts {
    fn from(config: &HttpConfig) -> Self {
        Self {
            read: config.read_timeout(),
            idle: config.idle_timeout(),
            write: config.write_timeout(),
            shutdown: config.shutdown_timeout(),
        }
    }
}

/// HTTP server for the zone control API
pub struct ControlServer {
    api: Arc<ControlApi>,
    timeouts: ServerTimeouts,
    state: watch::Sender<ServerState>,
}

impl ControlServer {
    pub fn new(api: Arc<ControlApi>, timeouts: ServerTimeouts) -> Self {
        let (state, _) = watch::channel(ServerState::NotStarted);
        Self {
            api,
            timeouts,
            state,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind `addr` and serve until `cancel` fires
    pub async fn run(
        &self,
        addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<(), ControlError> {
        info!("Starting HTTP control interface on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ControlError::Bind { addr, source })?;

        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), ControlError> {
        let addr = listener.local_addr()?;
        info!("Control API listening on http://{}", addr);
        self.state.send_replace(ServerState::Running);

        let stop = CancellationToken::new();
        let result = tokio::try_join!(
            self.accept_loop(listener, stop.clone()),
            self.watch_shutdown(cancel, stop),
        );

        self.state.send_replace(ServerState::Stopped);
        match result {
            Ok(_) => {
                info!("HTTP control interface stopped");
                Ok(())
            }
            Err(e) => {
                error!("HTTP control interface failed: {}", e);
                Err(e)
            }
        }
    }

    async fn watch_shutdown(
        &self,
        cancel: CancellationToken,
        stop: CancellationToken,
    ) -> Result<(), ControlError> {
        cancel.cancelled().await;
        info!("Shutting down HTTP control interface");
        self.state.send_replace(ServerState::ShuttingDown);
        stop.cancel();
        Ok(())
    }

    async fn accept_loop(
        &self,
        listener: TcpListener,
        stop: CancellationToken,
    ) -> Result<(), ControlError> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted control connection from {}", peer);
                        connections.spawn(serve_connection(
                            Arc::clone(&self.api),
                            stream,
                            self.timeouts,
                            stop.clone(),
                        ));
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        warn!("Transient accept error: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    Err(e) => return Err(ControlError::Accept(e)),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Control connection task failed: {}", e);
                    }
                }
            }
        }

        drop(listener);
        self.drain(connections).await;
        Ok(())
    }

    /// Wait for open connections up to the shutdown deadline, then abort the rest
    async fn drain(&self, mut connections: JoinSet<()>) {
        if connections.is_empty() {
            return;
        }
        info!("Waiting for {} open control connections", connections.len());

        let drained = tokio::time::timeout(self.timeouts.shutdown, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                "Shutdown deadline passed, aborting {} control connections",
                connections.len()
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }
    }
}

/// Serve one TCP connection until the peer goes away, it sits idle, or the
/// server stops.
async fn serve_connection(
    api: Arc<ControlApi>,
    stream: TcpStream,
    timeouts: ServerTimeouts,
    stop: CancellationToken,
) {
    let activity = Arc::new(ConnectionActivity::default());

    let service = {
        let activity = Arc::clone(&activity);
        service_fn(move |req| {
            let api = Arc::clone(&api);
            let activity = Arc::clone(&activity);
            async move {
                let _in_flight = activity.begin();
                match tokio::time::timeout(timeouts.write, api.handle_request(req)).await {
                    Ok(response) => response,
                    Err(_) => {
                        warn!("Control request exceeded {:?}", timeouts.write);
                        Ok(api_error(&ApiError::Timeout))
                    }
                }
            }
        })
    };

    let mut http = Http::new();
    http.http1_only(true)
        .http1_keep_alive(true)
        .http1_header_read_timeout(timeouts.read);
    let conn = http.serve_connection(stream, service);
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!("Control connection closed with error: {}", e);
                }
                return;
            }
            _ = stop.cancelled(), if !closing => {
                conn.as_mut().graceful_shutdown();
                closing = true;
            }
            _ = activity.idle_for(timeouts.idle), if !closing => {
                debug!("Closing idle control connection");
                conn.as_mut().graceful_shutdown();
                closing = true;
            }
        }
    }
}

fn is_transient_accept_error(e: &io::Error) -> bool {
    use io::ErrorKind::*;

    // ENFILE / EMFILE: out of descriptors, worth retrying once some close
    matches!(
        e.kind(),
        ConnectionAborted
            | ConnectionReset
            | ConnectionRefused
            | Interrupted
            | WouldBlock
            | TimedOut
    ) || matches!(e.raw_os_error(), Some(23) | Some(24))
}

/// Tracks requests in flight on one connection
#[derive(Default)]
struct ConnectionActivity {
    in_flight: AtomicUsize,
    changed: Notify,
}

impl ConnectionActivity {
    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_one();
        InFlight(Arc::clone(self))
    }

    /// Resolves once the connection has had no request in flight and no
    /// request activity for `period`
    async fn idle_for(&self, period: Duration) {
        loop {
            let quiet = tokio::time::timeout(period, self.changed.notified())
                .await
                .is_err();
            if quiet && self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
        }
    }
}

struct InFlight(Arc<ConnectionActivity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.changed.notify_one();
    }
}
