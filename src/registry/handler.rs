//! Socket handlers and the endpoint-to-handler map.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::context::ConnectionContext;
use crate::routing::pattern::is_identifier;
use crate::routing::ConfigError;

/// Error returned by a socket handler. Not recovered by the dispatcher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// A long-lived handler that owns one upgraded socket.
///
/// Implemented for any `Fn(S, ConnectionContext) -> impl Future<Output = HandlerResult>`,
/// so plain `async fn`s register directly.
pub trait SocketHandler<S>: Send + Sync + 'static {
    fn call(&self, socket: S, cx: ConnectionContext) -> BoxFuture<'static, HandlerResult>;
}

impl<S, F, Fut> SocketHandler<S> for F
where
    F: Fn(S, ConnectionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, socket: S, cx: ConnectionContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(socket, cx))
    }
}

pub type BoxedHandler<S> = Arc<dyn SocketHandler<S>>;

/// Maps endpoint names to handlers. Last binding for a name wins.
pub struct HandlerRegistry<S> {
    handlers: HashMap<String, BoxedHandler<S>>,
}

impl<S> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Bind `handler` to `endpoint`. Returns true if an earlier binding was replaced.
    pub fn bind(&mut self, endpoint: &str, handler: BoxedHandler<S>) -> bool {
        self.handlers
            .insert(endpoint.to_string(), handler)
            .is_some()
    }

    pub fn get(&self, endpoint: &str) -> Option<BoxedHandler<S>> {
        self.handlers.get(endpoint).map(Arc::clone)
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.handlers.contains_key(endpoint)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for HandlerRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut endpoints: Vec<_> = self.endpoints().collect();
        endpoints.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("endpoints", &endpoints)
            .finish()
    }
}

/// Default endpoint name for a handler: the last path segment of its type name.
///
/// Named `fn` items have one (`my_app::sockets::chat` → `chat`). Closures,
/// function pointers, boxed trait objects and generic instantiations do not;
/// their type names would collide, so they need an explicit endpoint.
pub fn endpoint_from_handler<H>() -> Result<String, ConfigError> {
    let type_name = std::any::type_name::<H>();
    let path = type_name.trim_start_matches('&');

    let anonymous = || ConfigError::AnonymousHandler {
        type_name: type_name.to_string(),
    };
    if path.contains(['<', '(', ' ']) || path.contains("{{closure}}") {
        return Err(anonymous());
    }

    match path.rsplit("::").next() {
        Some(name) if is_identifier(name) => Ok(name.to_string()),
        _ => Err(anonymous()),
    }
}

pub(crate) fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.trim().is_empty() {
        return Err(ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn greet(_socket: (), _cx: ConnectionContext) -> HandlerResult {
        Ok(())
    }

    async fn refuse(_socket: (), _cx: ConnectionContext) -> HandlerResult {
        Err("refused".into())
    }

    fn type_of<T>(_: &T) -> std::marker::PhantomData<T> {
        std::marker::PhantomData
    }

    fn endpoint_of<T>(_: std::marker::PhantomData<T>) -> Result<String, ConfigError> {
        endpoint_from_handler::<T>()
    }

    #[test]
    fn named_functions_give_their_name() {
        assert_eq!(endpoint_of(type_of(&greet)).unwrap(), "greet");
    }

    #[test]
    fn closures_have_no_default_endpoint() {
        let closure = |_: (), _: ConnectionContext| async { Ok::<(), HandlerError>(()) };
        assert!(matches!(
            endpoint_of(type_of(&closure)),
            Err(ConfigError::AnonymousHandler { .. })
        ));
    }

    #[test]
    fn function_pointers_have_no_default_endpoint() {
        let pointer: fn((), ConnectionContext) -> BoxFuture<'static, HandlerResult> =
            |socket: (), cx: ConnectionContext| -> BoxFuture<'static, HandlerResult> {
                Box::pin(greet(socket, cx))
            };
        assert!(matches!(
            endpoint_of(type_of(&pointer)),
            Err(ConfigError::AnonymousHandler { .. })
        ));

        let boxed: Box<dyn Fn((), ConnectionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync> =
            Box::new(|socket: (), cx: ConnectionContext| -> BoxFuture<'static, HandlerResult> {
                Box::pin(greet(socket, cx))
            });
        assert!(matches!(
            endpoint_of(type_of(&boxed)),
            Err(ConfigError::AnonymousHandler { .. })
        ));
    }

    #[test]
    fn references_to_functions_keep_the_name() {
        assert_eq!(endpoint_of(type_of(&&refuse)).unwrap(), "refuse");
    }

    #[tokio::test]
    async fn last_binding_wins() {
        let mut registry: HandlerRegistry<()> = HandlerRegistry::new();
        assert!(!registry.bind("x", Arc::new(greet)));
        assert!(registry.bind("x", Arc::new(refuse)));
        assert_eq!(registry.len(), 1);

        let handler = registry.get("x").unwrap();
        let result = handler.call((), ConnectionContext::new("x", Default::default())).await;
        assert!(result.is_err());
    }
}
