//! Listener TLS identity.
//!
//! # Data Flow
//! ```text
//! startup
//!     → synthesizer.rs (fresh key pair + self-signed CA certificate)
//!     → provider.rs (CertificateProvider: one identity, or one per SNI name)
//!     → net::tls (rustls resolver asks the provider on every handshake)
//! ```
//!
//! # Design Decisions
//! - Identities live in memory only; a restart is the only way to rotate
//! - Synthesis failure at startup is fatal
//! - Trust chain validation of the listener is out of scope: clients are
//!   expected to accept the self-issued certificate

pub mod provider;
pub mod synthesizer;

pub use provider::{CertificateProvider, PerNameCertificates, StaticCertificate};
pub use synthesizer::{synthesize, SelfSignedIdentity};

/// Errors raised while building a TLS identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("failed to generate certificate: {0}")]
    Generation(#[from] rcgen::Error),
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(String),
    #[error("failed to create signing key: {0}")]
    SigningKey(#[source] rustls::Error),
}
