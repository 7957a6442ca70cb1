//! TLS-terminating URL fetch proxy library.
//!
//! Callers send ordinary HTTP requests over TLS, naming the real destination
//! in the request URI and passing proxy parameters in `X-UrlFetch-*`
//! headers. The proxy authenticates the caller, strips those headers,
//! forwards the request over a pooled client and relays the upstream
//! response with status 200.

pub mod config;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod transport;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use identity::{CertificateProvider, PerNameCertificates, StaticCertificate};
pub use lifecycle::Shutdown;
pub use transport::ForwardingTransport;

use std::sync::Arc;

use config::CertificateMode;
use identity::IdentityError;

/// Build the certificate provider selected by the listener configuration.
///
/// In static mode the identity is synthesized here, so a failure aborts
/// startup before anything is served.
pub fn certificate_provider(
    listener: &config::ListenerConfig,
) -> Result<Arc<dyn CertificateProvider>, IdentityError> {
    Ok(match listener.certificate_mode {
        CertificateMode::Static => Arc::new(StaticCertificate::generate(&listener.common_name)?),
        CertificateMode::PerName => {
            let provider = PerNameCertificates::new(
                listener.common_name.as_str(),
                listener.certificate_cache_size,
            );
            // Fail at startup rather than on the first handshake.
            provider.certificate_for(None)?;
            Arc::new(provider)
        }
    })
}
