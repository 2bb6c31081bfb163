//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Build the Axum router around the echo handler
//! - Run the accept loop over the bounded listener
//! - Serve each connection with hyper's HTTP/1.1 machinery over a
//!   [`ControlledStream`], so handlers can take the socket over
//! - Enforce read and write deadlines per request
//! - Drain in-flight connections on shutdown
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → Acceptor (plain | TLS)
//!     → takeover::controlled (ControlledStream + ConnectionHandle)
//!     → hyper http1 connection
//!         → per request: insert ConnectionHandle + ConnectInfo
//!         → Router (request id, trace) → echo_handler
//! ```

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request},
    routing::any,
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::config::loader::{load_body, ConfigError};
use crate::config::schema::{EchoConfig, TimeoutConfig};
use crate::echo::ResponseSettings;
use crate::http::handler::echo_handler;
use crate::http::proxy::ProxyDelegate;
use crate::http::request::request_id_layer;
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::takeover::{self, IoTimeouts, WriteState};
use crate::net::tls::Acceptor;
use crate::observability::Console;
use crate::resilience::timeouts::{with_deadline, Deadline, Elapsed};

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to set up TLS: {0}")]
    Tls(#[source] io::Error),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Limits applied while buffering a request body.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_body_bytes: usize,
    pub read_timeout: Duration,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ResponseSettings>,
    pub proxy: ProxyDelegate,
    pub console: Arc<Console>,
    pub limits: RequestLimits,
}

/// The echo server.
pub struct EchoServer {
    router: Router,
    config: EchoConfig,
    settings: Arc<ResponseSettings>,
}

impl EchoServer {
    /// Create a server from a validated configuration. Reads the body file.
    pub fn new(config: EchoConfig) -> Result<Self, ConfigError> {
        let body = load_body(&config.response)?;
        let settings =
            Arc::new(ResponseSettings::from_config(&config, body).map_err(ConfigError::Settings)?);

        let state = AppState {
            settings: settings.clone(),
            proxy: ProxyDelegate::new(&config.proxy, config.timeouts.proxy()),
            console: Arc::new(Console::new(config.console.clone())),
            limits: RequestLimits {
                max_body_bytes: config.response.max_body_bytes,
                read_timeout: config.timeouts.read(),
            },
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            settings,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(echo_handler))
            .route("/{*path}", any(echo_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(request_id_layer())
    }

    /// Shared response settings, for applying config reloads.
    pub fn settings(&self) -> Arc<ResponseSettings> {
        self.settings.clone()
    }

    /// Accept and serve connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let acceptor = Acceptor::from_config(self.config.listener.tls.as_ref())
            .await
            .map_err(ServerError::Tls)?;
        let tracker = ConnectionTracker::new();
        let timeouts = self.config.timeouts.clone();

        tracing::info!(
            address = ?listener.local_addr().ok(),
            tls = acceptor.is_tls(),
            max_connections = listener.max_connections(),
            "HTTP server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::Closed) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };

                    let connection = Connection {
                        router: self.router.clone(),
                        acceptor: acceptor.clone(),
                        timeouts: timeouts.clone(),
                        peer,
                        guard: tracker.track(),
                        _permit: permit,
                    };
                    tokio::spawn(connection.serve(stream, shutdown.resubscribe()));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        drop(listener);
        let drain_limit = timeouts.write().max(timeouts.read());
        tracker.drain(drain_limit).await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// One accepted connection and everything it holds until it closes.
struct Connection {
    router: Router,
    acceptor: Acceptor,
    timeouts: TimeoutConfig,
    peer: SocketAddr,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
}

impl Connection {
    async fn serve(self, stream: TcpStream, mut shutdown: broadcast::Receiver<()>) {
        let connection_id = self.guard.id();
        let peer = self.peer;

        let io = match self.acceptor.accept(stream).await {
            Ok(io) => io,
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    peer = %peer,
                    error = %e,
                    "TLS handshake failed"
                );
                return;
            }
        };

        let (stream, handle) = takeover::controlled(
            io,
            IoTimeouts {
                idle: self.timeouts.idle(),
                write: self.timeouts.write(),
            },
        );

        let router = self.router;
        let write_limit = self.timeouts.write();
        let service_handle = handle.clone();
        let service = service_fn(move |mut request: Request<Incoming>| {
            let router = router.clone();
            let handle = service_handle.clone();
            request.extensions_mut().insert(handle.clone());
            request.extensions_mut().insert(ConnectInfo(peer));
            if !write_limit.is_zero() {
                request.extensions_mut().insert(Deadline::after(write_limit));
            }

            async move {
                let _busy = handle.busy();
                let response =
                    with_deadline("response", write_limit, router.oneshot(request)).await?;
                Ok::<_, Elapsed>(response.unwrap_or_else(|never: Infallible| match never {}))
            }
        });

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.timeouts.read())
            .keep_alive(true);
        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        match result {
            Ok(()) => tracing::trace!(connection_id = %connection_id, "Connection closed"),
            Err(_) if matches!(handle.state(), WriteState::RawTakeover | WriteState::Closed) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    peer = %peer,
                    "Connection ended after raw takeover"
                );
            }
            Err(e) if e.is_timeout() => {
                tracing::debug!(
                    connection_id = %connection_id,
                    peer = %peer,
                    "Connection timed out reading headers"
                );
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    peer = %peer,
                    error = %e,
                    "Connection error"
                );
            }
        }
    }
}
