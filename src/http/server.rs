//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount the dispatcher as the service for every path
//! - Wire up middleware (tracing, body limit, timeout, request ID)
//! - Serve with graceful shutdown, then drain socket sessions

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::Service;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::session::SessionTracker;
use crate::http::websocket::Upgrade;

/// HTTP server fronting a [`Dispatcher`].
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    sessions: SessionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new<U, A>(config: ServerConfig, dispatcher: Dispatcher<U, A>) -> Self
    where
        U: Upgrade,
        A: Service<Request<Body>, Response = Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        A::Future: Send + 'static,
    {
        let sessions = dispatcher.sessions().clone();
        let router = Self::build_router(&config, dispatcher);
        Self {
            router,
            config,
            sessions,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The timeout bounds the HTTP exchange only; an accepted upgrade
    /// responds immediately and its session runs on its own task.
    #[allow(deprecated)]
    fn build_router<U, A>(config: &ServerConfig, dispatcher: Dispatcher<U, A>) -> Router
    where
        U: Upgrade,
        A: Service<Request<Body>, Response = Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        A::Future: Send + 'static,
    {
        Router::new()
            .fallback_service(dispatcher)
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        if !self.sessions.wait_idle(grace).await {
            tracing::warn!(
                open_sessions = self.sessions.active_count(),
                grace_secs = grace.as_secs(),
                "Socket sessions still open after grace period"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }
}
