//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file, PORT / PASSWORD from the environment,
//!                  then command-line overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to the handler and transport constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the shared secret never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_startup_config, resolve_config, ConfigError, ConfigOverrides};
pub use schema::{
    AuthConfig, CertificateMode, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    TimeoutConfig, TransportConfig,
};
