//! apigwd - API gateway daemon
//!
//! Routes `/api/{service}/...` to registered backends behind a JWT auth
//! gate, and reports backend health under `/health`.
//!
//! Usage:
//!   apigwd [--config apigw.toml] [--port 3000] [--log-format pretty|json]
//!
//! Without a config file the built-in service set on localhost:3001-3007
//! is used.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use apigw_api::{create_router, AppState};
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::GatewayConfig;

const DEFAULT_LOG_FILTER: &str =
    "apigwd=info,apigw=info,apigw_api=info,apigw_proxy=info,apigw_auth=info,apigw_health=info";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "apigwd")]
#[command(author, version, about = "API gateway daemon")]
struct Args {
    /// Gateway config file (TOML)
    #[arg(short, long, env = "APIGW_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overrides the config file and PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, env = "APIGW_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting apigwd");

    let mut config =
        GatewayConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let registry = Arc::new(config.registry().context("invalid service registry")?);
    info!(count = registry.len(), services = ?registry.list_names(), "Service registry ready");

    let auth = config.auth_config().context("invalid auth configuration")?;
    if auth.validate_url.is_some() {
        info!(url = ?auth.validate_url.as_ref().map(|u| u.as_str()), "Remote token validation enabled");
    }

    let state = AppState::new(registry, auth)
        .context("failed to build HTTP clients")?
        .with_allowed_origins(config.server.allowed_origins.clone())
        .with_body_limit(config.server.body_limit_bytes)
        .with_trust_forwarded_for(config.server.trust_forwarded_for);
    let app = create_router(state);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(addr = %listener.local_addr()?, "Gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway stopped");
    Ok(())
}
