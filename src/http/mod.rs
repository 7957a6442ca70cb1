//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection (HTTP/1.1 or HTTP/2)
//!     → server.rs (Axum setup, one task per connection)
//!     → params.rs (collect and strip X-UrlFetch-*, check the shared secret)
//!     → transport (round trip to the request's own destination)
//!     → response.rs (copy headers, 200 OK, stream body)
//!     → Send to client
//! ```
//!
//! Status codes produced by the proxy itself: 403 on authentication failure,
//! 502 when the round trip fails. Everything else is a relayed upstream
//! response with status 200.

pub mod params;
pub mod response;
pub mod server;

pub use params::{extract_and_authenticate, AuthError, FetchParams, SharedSecret, PARAM_PREFIX};
pub use server::{build_router, AppState, HttpServer, ServerError};
