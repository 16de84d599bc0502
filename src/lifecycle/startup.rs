//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics before traffic arrives
//! - Bind the listener and start serving
//! - Tie the server to the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::Service;

use crate::config::ServerConfig;
use crate::http::{Dispatcher, HttpServer, Upgrade};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// Error type for server startup and serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Install the metrics exporter if enabled.
pub fn init_metrics(config: &ServerConfig) -> Result<(), StartupError> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }
    let addr: SocketAddr = config
        .observability
        .metrics_address
        .parse()
        .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
    metrics::init_metrics(addr)?;
    Ok(())
}

/// Bind the configured address.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, StartupError> {
    let address = &config.listener.bind_address;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %address, "Listening for connections");
    Ok(listener)
}

/// Serve `dispatcher` until `shutdown` fires.
pub async fn serve<U, A>(
    config: ServerConfig,
    dispatcher: Dispatcher<U, A>,
    shutdown: &Shutdown,
) -> Result<(), StartupError>
where
    U: Upgrade,
    A: Service<Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    A::Future: Send + 'static,
{
    init_metrics(&config)?;
    let listener = bind(&config).await?;

    let server = HttpServer::new(config, dispatcher);
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
