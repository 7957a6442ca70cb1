//! HTTP server setup and the fetch handler.
//!
//! # Responsibilities
//! - Create the Axum router with the fetch handler for every method and path
//! - Serve HTTP/1.1 and HTTP/2 over TLS with keep-alive tuned sockets
//! - Per request: extract and authenticate parameters, forward, relay

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::http::params::{self, plain_error, SharedSecret};
use crate::http::response;
use crate::identity::CertificateProvider;
use crate::lifecycle::Shutdown;
use crate::net::{self, KeepAliveAcceptor};
use crate::observability::metrics;
use crate::transport::{ForwardError, ForwardingTransport};

/// Errors that stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
    #[error("failed to build TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: ForwardingTransport,
    pub secret: SharedSecret,
    pub body_idle_timeout: Option<Duration>,
}

impl AppState {
    /// Build the state from configuration. The transport is created once
    /// here and shared by every request.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, rustls::Error> {
        Ok(Self {
            transport: ForwardingTransport::new(
                &config.transport,
                config.timeouts.response_head(),
            )?,
            secret: SharedSecret::new(&config.auth.password),
            body_idle_timeout: config.timeouts.body_idle(),
        })
    }
}

/// HTTPS server for the fetch proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    tls: RustlsConfig,
}

impl HttpServer {
    /// Create a new server presenting certificates from `provider`.
    pub fn new(
        config: ProxyConfig,
        provider: Arc<dyn CertificateProvider>,
    ) -> Result<Self, ServerError> {
        let state = AppState::from_config(&config)?;
        let tls = net::rustls_config(provider)?;
        Ok(Self {
            router: build_router(state),
            config: Arc::new(config),
            tls,
        })
    }

    /// Bind and serve until `shutdown` is triggered.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), ServerError> {
        let ip: IpAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|_| ServerError::BindAddress(self.config.listener.bind_address.clone()))?;
        let addr = SocketAddr::new(ip, self.config.listener.port);

        let acceptor = RustlsAcceptor::new(self.tls)
            .acceptor(KeepAliveAcceptor::new(self.config.listener.keepalive()));

        tracing::info!(
            address = %addr,
            keepalive_secs = self.config.listener.keepalive_secs,
            "HTTPS server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind(addr)
            .acceptor(acceptor)
            .handle(shutdown.handle())
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Build the Axum router: every method and path goes to the fetch handler.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(fetch_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Authenticate, forward and relay one request.
async fn fetch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let span = tracing::info_span!("fetch", request_id = %Uuid::new_v4());
    handle_fetch(state, request).instrument(span).await
}

async fn handle_fetch(state: AppState, mut request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    tracing::info!(
        peer = %peer,
        method = %request.method(),
        url = %request.uri(),
        version = ?request.version(),
        "request"
    );

    if let Err(e) = params::extract_and_authenticate(request.headers_mut(), &state.secret) {
        tracing::warn!(peer = %peer, "rejected request: {}", e);
        metrics::record_auth_failure();
        metrics::record_request(&method, StatusCode::FORBIDDEN, start_time);
        return e.into_response();
    }

    match state.transport.round_trip(request).await {
        Ok(upstream) => {
            tracing::info!(
                upstream_status = upstream.status().as_u16(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "relaying upstream response"
            );
            metrics::record_request(&method, StatusCode::OK, start_time);
            response::relay(upstream, state.body_idle_timeout)
        }
        Err(e) => {
            tracing::error!(error = %e, "upstream round trip failed");
            metrics::record_upstream_error();
            metrics::record_request(&method, StatusCode::BAD_GATEWAY, start_time);
            e.into_response()
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        plain_error(StatusCode::BAD_GATEWAY, &self.to_string())
    }
}
