//! Forwarding transport subsystem.
//!
//! # Data Flow
//! ```text
//! cleaned request (absolute URI)
//!     → client.rs (shared hyper-util pool, per-host idle cap)
//!     → connector.rs (connect + TLS handshake deadline)
//!     → hyper-rustls (ALPN h2/http1.1, session resumption cache)
//!     → verifier.rs (upstream certificates accepted as-is)
//!     → upstream response head, body streamed on demand
//! ```
//!
//! # Design Decisions
//! - One transport per process, injected into the handler state
//! - Upstream certificate verification is off by default: the caller picks
//!   the destination and the proxy trusts it
//! - Failures surface once; retry policy belongs to the caller

pub mod client;
pub mod connector;
pub mod verifier;

use std::error::Error as StdError;
use std::time::Duration;

pub use client::{client_tls_config, ForwardingTransport};
pub use connector::{HandshakeTimeout, TimeoutConnector};
pub use verifier::NoVerification;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A round trip that produced no upstream response.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("unsupported destination {0:?}: request URI must be absolute")]
    MissingDestination(String),
    #[error("unsupported protocol scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("{}", error_chain(.0))]
    Upstream(#[source] hyper_util::client::legacy::Error),
    #[error("timeout awaiting response headers after {0:?}")]
    ResponseHeadTimeout(Duration),
}

/// Render an error and all of its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !text.ends_with(&message) {
            text.push_str(": ");
            text.push_str(&message);
        }
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn error_chain_joins_sources() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&err), "outer: connection refused");
    }
}
