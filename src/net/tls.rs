//! TLS termination for the listener.

use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tracing::{debug, error};

use crate::identity::CertificateProvider;

/// ALPN protocols advertised to clients, most preferred first.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Build the listener's rustls config. Certificates come from `provider` on
/// every handshake; HTTP/2 and HTTP/1.1 are both advertised.
pub fn build_server_config(
    provider: Arc<dyn CertificateProvider>,
) -> Result<Arc<ServerConfig>, rustls::Error> {
    let resolver = Arc::new(ProviderResolver { provider });
    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_cert_resolver(resolver);
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(Arc::new(config))
}

/// Wrap a server config for axum-server's rustls acceptor.
pub fn rustls_config(
    provider: Arc<dyn CertificateProvider>,
) -> Result<RustlsConfig, rustls::Error> {
    Ok(RustlsConfig::from_config(build_server_config(provider)?))
}

/// Adapts a [`CertificateProvider`] to rustls certificate resolution.
struct ProviderResolver {
    provider: Arc<dyn CertificateProvider>,
}

impl std::fmt::Debug for ProviderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResolver")
            .field("provider", &self.provider)
            .finish()
    }
}

impl ResolvesServerCert for ProviderResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let sni = client_hello.server_name();
        debug!(sni = ?sni, "resolving listener certificate");
        match self.provider.certificate_for(sni) {
            Ok(key) => Some(key),
            Err(e) => {
                error!(sni = ?sni, error = %e, "failed to provide certificate");
                None
            }
        }
    }
}
