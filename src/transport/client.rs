//! Pooled outbound HTTP client.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::{Request, Response, Uri, Version};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::client::Resumption;
use rustls::{ClientConfig, RootCertStore};

use super::connector::TimeoutConnector;
use super::verifier::NoVerification;
use super::ForwardError;
use crate::config::TransportConfig;

type Connector = TimeoutConnector<HttpsConnector<HttpConnector>>;

/// The process-wide forwarding transport.
///
/// Cloning is cheap and every clone shares one connection pool and one TLS
/// session cache, so a single instance serves all concurrent requests.
#[derive(Clone)]
pub struct ForwardingTransport {
    client: Client<Connector, Body>,
    response_head_timeout: Option<Duration>,
}

impl ForwardingTransport {
    /// Build the transport from configuration.
    ///
    /// `response_head_timeout` bounds the wait for upstream response headers;
    /// `None` waits indefinitely.
    pub fn new(
        config: &TransportConfig,
        response_head_timeout: Option<Duration>,
    ) -> Result<Self, rustls::Error> {
        let tls = client_tls_config(config)?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.idle_timeout())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(TimeoutConnector::new(https, config.handshake_timeout()));

        if config.insecure_skip_verify {
            tracing::warn!("upstream TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            response_head_timeout,
        })
    }

    /// Perform one outbound request/response exchange.
    ///
    /// The request goes to its own URI, which must be absolute. Headers and
    /// body are sent as given. Nothing is retried.
    ///
    /// Compression is not negotiated on the caller's behalf: no
    /// `Accept-Encoding` is added and encoded bodies are relayed as received,
    /// `Content-Encoding` included. A caller that sends no `Accept-Encoding`
    /// therefore gets whatever the upstream chooses to send, usually identity.
    pub async fn round_trip(
        &self,
        mut request: Request<Body>,
    ) -> Result<Response<Incoming>, ForwardError> {
        check_destination(request.uri())?;

        // The pool negotiates HTTP/1.1 or HTTP/2 per upstream via ALPN.
        *request.version_mut() = Version::HTTP_11;

        let sending = self.client.request(request);
        let result = match self.response_head_timeout {
            Some(limit) => tokio::time::timeout(limit, sending)
                .await
                .map_err(|_| ForwardError::ResponseHeadTimeout(limit))?,
            None => sending.await,
        };
        result.map_err(ForwardError::Upstream)
    }
}

fn check_destination(uri: &Uri) -> Result<(), ForwardError> {
    let Some(scheme) = uri.scheme_str() else {
        return Err(ForwardError::MissingDestination(uri.to_string()));
    };
    if uri.authority().is_none() {
        return Err(ForwardError::MissingDestination(uri.to_string()));
    }
    match scheme {
        "http" | "https" => Ok(()),
        other => Err(ForwardError::UnsupportedScheme(other.to_string())),
    }
}

/// TLS settings for upstream connections: bounded in-memory session cache,
/// and either no certificate verification or the webpki root set.
pub fn client_tls_config(config: &TransportConfig) -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let mut tls = if config.insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification::new(provider)))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    tls.resumption = Resumption::in_memory_sessions(config.session_cache_size);

    Ok(tls)
}
