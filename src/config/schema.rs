//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the fetch proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, port, identity).
    pub listener: ListenerConfig,

    /// Shared-secret authentication.
    pub auth: AuthConfig,

    /// Outbound forwarding transport.
    pub transport: TransportConfig,

    /// Request and relay timeouts.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How the listener picks the certificate it presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CertificateMode {
    /// One certificate for `common_name`, generated at startup.
    #[default]
    Static,
    /// One certificate per SNI name, generated on first handshake.
    PerName,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (all interfaces by default).
    pub bind_address: String,

    /// TCP port to listen on. Overridden by `PORT`.
    pub port: u16,

    /// TCP keep-alive probe period for accepted connections, in seconds.
    pub keepalive_secs: u64,

    /// Name written into the synthesized certificate.
    pub common_name: String,

    /// Certificate selection strategy.
    pub certificate_mode: CertificateMode,

    /// Most SNI names kept in `per_name` mode before the oldest is evicted.
    pub certificate_cache_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 443,
            keepalive_secs: 180,
            common_name: "www.gov.cn".to_string(),
            certificate_mode: CertificateMode::Static,
            certificate_cache_size: 256,
        }
    }
}

impl ListenerConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

/// Shared-secret authentication.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected `X-UrlFetch-Password` value. Empty disables authentication.
    /// Overridden by `PASSWORD`.
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &!self.password.is_empty())
            .finish()
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Skip certificate verification of upstream servers. The proxy trusts
    /// whatever server the caller directs it to.
    pub insecure_skip_verify: bool,

    /// Maximum number of cached TLS client sessions.
    pub session_cache_size: usize,

    /// Bound on TCP connect plus TLS handshake, in seconds.
    pub handshake_timeout_secs: u64,

    /// Idle connections kept per upstream host.
    pub max_idle_per_host: usize,

    /// How long an idle pooled connection is kept, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: true,
            session_cache_size: 1000,
            handshake_timeout_secs: 30,
            max_idle_per_host: 4,
            idle_timeout_secs: 90,
        }
    }
}

impl TransportConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Timeout configuration. Zero disables a timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed until the upstream response head arrives, in seconds.
    pub response_head_secs: u64,

    /// Longest gap between two upstream body frames while relaying, in seconds.
    pub body_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            response_head_secs: 0,
            body_idle_secs: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn response_head(&self) -> Option<Duration> {
        non_zero_secs(self.response_head_secs)
    }

    pub fn body_idle(&self) -> Option<Duration> {
        non_zero_secs(self.body_idle_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
