//! urlfetch-proxy
//!
//! A TLS-terminating HTTP forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────────┐
//!                     │                  URLFETCH PROXY                    │
//!                     │                                                    │
//!   Client request    │  ┌──────────┐   ┌─────────┐   ┌────────────────┐   │
//!   ──────────────────┼─▶│   net    │──▶│  http   │──▶│ params: strip  │   │
//!   (TLS, h2/http1.1) │  │keep-alive│   │ server  │   │ X-UrlFetch-*,  │   │
//!                     │  │  + TLS   │   └─────────┘   │ check secret   │   │
//!                     │  └────▲─────┘                 └───────┬────────┘   │
//!                     │       │ certificate                   │            │
//!                     │  ┌────┴─────┐                         ▼            │
//!                     │  │ identity │                 ┌────────────────┐   │
//!                     │  │self-signed                 │   transport    │───┼──▶ Upstream
//!                     │  └──────────┘                 │ pooled client  │◀──┼─── (request's
//!   Client response   │  ┌──────────┐                 └───────┬────────┘   │     own URI)
//!   ◀─────────────────┼──│ response │◀────────────────────────┘            │
//!   (always 200)      │  │  relay   │                                      │
//!                     │  └──────────┘                                      │
//!                     └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use urlfetch_proxy::config::{load_startup_config, ConfigOverrides, LogFormat};
use urlfetch_proxy::observability::{init_logging, metrics};
use urlfetch_proxy::{certificate_provider, HttpServer, Shutdown};

/// TLS-terminating URL fetch proxy.
#[derive(Parser, Debug)]
#[command(name = "urlfetch-proxy")]
#[command(version, about)]
struct Args {
    /// Optional TOML configuration file. `PORT` and `PASSWORD` from the
    /// environment override it.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Listening port (overrides config and `PORT`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        port: args.port,
        log_level: args.log_level,
        log_format: args.json_logs.then_some(LogFormat::Json),
    };
    let config = load_startup_config(args.config.as_deref(), &overrides).map_err(|e| {
        // Logging is not up yet.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    init_logging(&config.observability).context("failed to initialise logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "urlfetch-proxy starting");
    tracing::info!(
        port = config.listener.port,
        auth_enabled = !config.auth.password.is_empty(),
        certificate_mode = ?config.listener.certificate_mode,
        max_idle_per_host = config.transport.max_idle_per_host,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .context("invalid metrics address")?;
        metrics::init_metrics(addr).context("failed to start metrics exporter")?;
    }

    let provider =
        certificate_provider(&config.listener).context("failed to synthesize TLS identity")?;

    let server = HttpServer::new(config, Arc::clone(&provider))
        .context("failed to build HTTPS server")?;

    let shutdown = Shutdown::new();
    shutdown.on_signal();

    server.run(&shutdown).await.context("server failed")?;

    tracing::info!("Shutdown complete");
    Ok(())
}
