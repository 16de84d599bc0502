//! Upgrade-aware request dispatch.
//!
//! # Responsibilities
//! - Consult the socket table first for every request
//! - Hand matched upgrades to their socket handler on a dedicated task
//! - Delegate everything else to the wrapped HTTP application, unchanged
//! - Bind a request-scoped [`UrlFor`] for HTTP and socket handlers alike
//!
//! # Data Flow
//! ```text
//! Request
//!     → socket RouteTable::match_path → HandlerRegistry::get
//!         miss:                      refuse any upgrade → HTTP app
//!         hit, no upgrade requested: HTTP app
//!         hit, upgrade requested:    session guard + span → handler(socket, context)
//! ```

use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{request::Parts, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};
use tracing::Instrument;

use crate::config::UrlConfig;
use crate::http::context::ConnectionContext;
use crate::http::session::{SessionGuard, SessionTracker};
use crate::http::websocket::Upgrade;
use crate::observability::metrics::{self, DelegateReason};
use crate::registry::{BoxedHandler, HandlerRegistry, Sockets};
use crate::routing::{BoundTable, DualBuilder, MatchError, RouteMatch, RouteTable, UrlContext, UrlFor};

/// Routes upgrade requests to socket handlers and everything else to `app`.
pub struct Dispatcher<U: Upgrade, A> {
    sockets: Arc<RouteTable>,
    handlers: Arc<HandlerRegistry<U::Socket>>,
    http_routes: Arc<RouteTable>,
    url_config: Arc<UrlConfig>,
    sessions: SessionTracker,
    app: A,
    _upgrade: PhantomData<fn() -> U>,
}

impl<U: Upgrade, A: Clone> Clone for Dispatcher<U, A> {
    fn clone(&self) -> Self {
        Self {
            sockets: Arc::clone(&self.sockets),
            handlers: Arc::clone(&self.handlers),
            http_routes: Arc::clone(&self.http_routes),
            url_config: Arc::clone(&self.url_config),
            sessions: self.sessions.clone(),
            app: self.app.clone(),
            _upgrade: PhantomData,
        }
    }
}

impl<U, A> Dispatcher<U, A>
where
    U: Upgrade,
    A: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    A::Future: Send + 'static,
{
    /// Freeze `sockets` and wrap `app`.
    pub fn new(sockets: Sockets<U::Socket>, app: A) -> Self {
        let (table, handlers) = sockets.into_parts();
        tracing::info!(
            socket_rules = table.len(),
            socket_handlers = handlers.len(),
            "Socket dispatcher ready"
        );

        Self {
            sockets: Arc::new(table),
            handlers: Arc::new(handlers),
            http_routes: Arc::new(RouteTable::new()),
            url_config: Arc::new(UrlConfig::default()),
            sessions: SessionTracker::new(),
            app,
            _upgrade: PhantomData,
        }
    }

    /// HTTP endpoints known to URL building. The app still does its own routing.
    pub fn with_http_routes(mut self, routes: RouteTable) -> Self {
        self.http_routes = Arc::new(routes);
        self
    }

    pub fn with_url_config(mut self, config: UrlConfig) -> Self {
        self.url_config = Arc::new(config);
        self
    }

    pub fn with_sessions(mut self, sessions: SessionTracker) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn socket_routes(&self) -> &RouteTable {
        &self.sockets
    }

    pub fn http_routes(&self) -> &RouteTable {
        &self.http_routes
    }

    /// URL builder bound to the request's host and scheme.
    pub fn url_for_request(&self, parts: &Parts) -> UrlFor {
        self.bind(UrlContext::for_request(parts, &self.url_config))
    }

    /// URL builder bound from configuration alone; needs `url.server_name`.
    pub fn url_builder(&self) -> Option<UrlFor> {
        UrlContext::from_config(&self.url_config).map(|context| self.bind(context))
    }

    fn bind(&self, context: UrlContext) -> UrlFor {
        UrlFor::new(DualBuilder::new(
            BoundTable::new(Arc::clone(&self.http_routes), context.clone()),
            BoundTable::new(Arc::clone(&self.sockets), context),
            self.url_config.socket_scheme.clone(),
        ))
    }

    /// Dispatch one request. Every branch produces the response to send.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();

        let (matched, handler) = match self.lookup(&parts) {
            Ok(found) => found,
            Err(reason) => {
                let refused = match U::detect(&mut parts).await {
                    Some(pending) => {
                        pending.close();
                        true
                    }
                    None => false,
                };
                tracing::trace!(
                    path = %parts.uri.path(),
                    reason = reason.as_str(),
                    upgrade_refused = refused,
                    "No socket handler; delegating"
                );
                return self.delegate(parts, body, reason, refused).await;
            }
        };

        let Some(pending) = U::detect(&mut parts).await else {
            tracing::trace!(
                path = %parts.uri.path(),
                endpoint = %matched.endpoint,
                "Socket endpoint requested without upgrade; delegating"
            );
            return self
                .delegate(parts, body, DelegateReason::NoUpgrade, false)
                .await;
        };
        drop(body);

        let guard = self.sessions.track(&matched.endpoint);
        let span = tracing::info_span!(
            "socket_session",
            session_id = %guard.id(),
            endpoint = %matched.endpoint,
            path = %parts.uri.path(),
        );
        let cx = ConnectionContext::from_request(
            guard.id(),
            matched.endpoint.clone(),
            matched.params,
            &parts,
            self.url_for_request(&parts),
        );

        metrics::record_socket_dispatch(&matched.endpoint);
        tracing::debug!(
            session_id = %guard.id(),
            endpoint = %matched.endpoint,
            remote_addr = ?cx.remote_addr(),
            "Accepting socket upgrade"
        );

        pending.accept(move |socket| run_session(handler, socket, cx, guard).instrument(span))
    }

    fn lookup(
        &self,
        parts: &Parts,
    ) -> Result<(RouteMatch, BoxedHandler<U::Socket>), DelegateReason> {
        let matched = self
            .sockets
            .match_path(parts.uri.path(), &parts.method)
            .map_err(|error| match error {
                MatchError::NotFound { .. } => DelegateReason::NotFound,
                MatchError::MethodNotAllowed { .. } => DelegateReason::MethodNotAllowed,
            })?;

        match self.handlers.get(&matched.endpoint) {
            Some(handler) => Ok((matched, handler)),
            None => {
                tracing::debug!(endpoint = %matched.endpoint, "Socket rule has no handler bound");
                Err(DelegateReason::NoHandler)
            }
        }
    }

    async fn delegate(
        &self,
        mut parts: Parts,
        body: Body,
        reason: DelegateReason,
        upgrade_refused: bool,
    ) -> Response {
        metrics::record_delegation(reason, upgrade_refused);

        let urls = self.url_for_request(&parts);
        parts.extensions.insert(urls);

        match self.app.clone().oneshot(Request::from_parts(parts, body)).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

async fn run_session<S: Send + 'static>(
    handler: BoxedHandler<S>,
    socket: S,
    cx: ConnectionContext,
    guard: SessionGuard,
) {
    tracing::debug!("Socket session started");

    match handler.call(socket, cx).await {
        Ok(()) => tracing::debug!("Socket session ended"),
        Err(error) => {
            // The transport is already consumed; dropping it closes the connection.
            tracing::warn!(error = %error, "Socket handler failed; connection dropped");
            metrics::record_handler_failure(guard.endpoint());
        }
    }

    drop(guard);
}

impl<U, A> Service<Request<Body>> for Dispatcher<U, A>
where
    U: Upgrade,
    A: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    A::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}
