//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (keep-alive on the accepted socket)
//!     → tls.rs (TLS handshake, certificate from the identity provider)
//!     → Hand off to HTTP layer (HTTP/1.1 or HTTP/2 by ALPN)
//! ```
//!
//! # Design Decisions
//! - Socket tuning happens before any handshake bytes are read
//! - Accept errors are left to the server loop

pub mod listener;
pub mod tls;

pub use listener::KeepAliveAcceptor;
pub use tls::{build_server_config, rustls_config};
