//! The socket routing table together with its handler registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::blueprint::{Blueprint, BlueprintOptions};
use crate::registry::handler::{
    endpoint_from_handler, validate_endpoint, BoxedHandler, HandlerRegistry, SocketHandler,
};
use crate::routing::{ConfigError, RouteTable, RuleOptions};

/// Socket rules, their handlers, and the blueprints registered on them.
///
/// Built at startup and frozen into a dispatcher with [`Sockets::into_parts`].
pub struct Sockets<S> {
    url_map: RouteTable,
    handlers: HandlerRegistry<S>,
    blueprints: HashMap<String, Arc<Blueprint<S>>>,
    blueprint_order: Vec<String>,
}

impl<S: Send + 'static> Sockets<S> {
    pub fn new() -> Self {
        Self {
            url_map: RouteTable::new(),
            handlers: HandlerRegistry::new(),
            blueprints: HashMap::new(),
            blueprint_order: Vec::new(),
        }
    }

    /// Register `handler` under `pattern`; the endpoint is the handler's name.
    pub fn route<H: SocketHandler<S>>(
        &mut self,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigError> {
        self.add_url_rule(pattern, None, handler, RuleOptions::new())
    }

    /// Register a rule and bind its handler.
    ///
    /// Re-binding an endpoint replaces the handler for every rule sharing it.
    pub fn add_url_rule<H: SocketHandler<S>>(
        &mut self,
        pattern: &str,
        endpoint: Option<&str>,
        handler: H,
        options: RuleOptions,
    ) -> Result<&mut Self, ConfigError> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => endpoint_from_handler::<H>()?,
        };
        self.add_boxed_rule(pattern, &endpoint, Arc::new(handler), options)?;
        Ok(self)
    }

    pub(crate) fn add_boxed_rule(
        &mut self,
        pattern: &str,
        endpoint: &str,
        handler: BoxedHandler<S>,
        options: RuleOptions,
    ) -> Result<(), ConfigError> {
        validate_endpoint(endpoint)?;
        self.url_map.add(pattern, endpoint, options)?;

        if self.handlers.bind(endpoint, handler) {
            tracing::debug!(endpoint = %endpoint, "Socket handler replaced");
        }
        tracing::debug!(endpoint = %endpoint, pattern = %pattern, "Socket rule registered");
        Ok(())
    }

    /// Register a blueprint's deferred rules.
    ///
    /// The same blueprint may be registered again without effect; a different
    /// blueprint under an already used name is rejected.
    pub fn register_blueprint(
        &mut self,
        blueprint: &Arc<Blueprint<S>>,
        options: BlueprintOptions,
    ) -> Result<&mut Self, ConfigError> {
        let name = blueprint.name();
        if name.is_empty() {
            return Err(ConfigError::InvalidBlueprintName {
                name: name.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if name.contains('.') {
            return Err(ConfigError::InvalidBlueprintName {
                name: name.to_string(),
                reason: "may not contain '.'".to_string(),
            });
        }

        let first_registration = match self.blueprints.get(name) {
            Some(existing) if Arc::ptr_eq(existing, blueprint) => false,
            Some(_) => {
                return Err(ConfigError::BlueprintCollision {
                    name: name.to_string(),
                })
            }
            None => true,
        };

        blueprint.register(self, &options, first_registration)?;

        if first_registration {
            self.blueprints
                .insert(name.to_string(), Arc::clone(blueprint));
            self.blueprint_order.push(name.to_string());
        }
        Ok(self)
    }

    /// Registered blueprints in registration order.
    pub fn blueprints(&self) -> impl Iterator<Item = &Arc<Blueprint<S>>> {
        self.blueprint_order
            .iter()
            .filter_map(|name| self.blueprints.get(name))
    }

    pub fn url_map(&self) -> &RouteTable {
        &self.url_map
    }

    pub fn handlers(&self) -> &HandlerRegistry<S> {
        &self.handlers
    }

    pub fn into_parts(self) -> (RouteTable, HandlerRegistry<S>) {
        (self.url_map, self.handlers)
    }
}

impl<S: Send + 'static> Default for Sockets<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Sockets<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sockets")
            .field("url_map", &self.url_map)
            .field("handlers", &self.handlers)
            .field("blueprints", &self.blueprint_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::ConnectionContext;
    use crate::registry::handler::{HandlerError, HandlerResult};
    use crate::routing::MatchError;
    use axum::http::Method;
    use futures_util::future::BoxFuture;

    async fn echo(_socket: (), _cx: ConnectionContext) -> HandlerResult {
        Ok(())
    }

    async fn room(_socket: (), _cx: ConnectionContext) -> HandlerResult {
        Ok(())
    }

    async fn lobby(_socket: (), _cx: ConnectionContext) -> HandlerResult {
        Err("closed".into())
    }

    #[test]
    fn route_derives_endpoint_from_function_name() {
        let mut sockets: Sockets<()> = Sockets::new();
        sockets.route("/echo", echo).unwrap();

        assert!(sockets.handlers().contains("echo"));
        let matched = sockets.url_map().match_path("/echo", &Method::GET).unwrap();
        assert_eq!(matched.endpoint, "echo");
    }

    #[test]
    fn closures_need_an_explicit_endpoint() {
        let mut sockets: Sockets<()> = Sockets::new();
        let err = sockets
            .route("/anon", |_: (), _: ConnectionContext| async { Ok::<(), HandlerError>(()) })
            .unwrap_err();
        assert!(matches!(err, ConfigError::AnonymousHandler { .. }));
        assert!(sockets.url_map().is_empty());

        sockets
            .add_url_rule(
                "/anon",
                Some("anon"),
                |_: (), _: ConnectionContext| async { Ok::<(), HandlerError>(()) },
                RuleOptions::new(),
            )
            .unwrap();
        assert!(sockets.handlers().contains("anon"));
    }

    #[test]
    fn function_pointers_need_an_explicit_endpoint() {
        type Pointer = fn((), ConnectionContext) -> BoxFuture<'static, HandlerResult>;
        let first: Pointer = |socket: (), cx: ConnectionContext| -> BoxFuture<'static, HandlerResult> {
            Box::pin(echo(socket, cx))
        };
        let second: Pointer = |socket: (), cx: ConnectionContext| -> BoxFuture<'static, HandlerResult> {
            Box::pin(lobby(socket, cx))
        };

        let mut sockets: Sockets<()> = Sockets::new();
        assert!(matches!(
            sockets.route("/a", first),
            Err(ConfigError::AnonymousHandler { .. })
        ));
        sockets
            .add_url_rule("/a", Some("a"), first, RuleOptions::new())
            .unwrap()
            .add_url_rule("/b", Some("b"), second, RuleOptions::new())
            .unwrap();

        assert_eq!(sockets.handlers().len(), 2);
        let matched = sockets.url_map().match_path("/b", &Method::GET).unwrap();
        assert_eq!(matched.endpoint, "b");
    }

    #[test]
    fn blueprint_rules_are_prefixed_and_namespaced() {
        let mut chat = Blueprint::<()>::new("chat").with_url_prefix("/chat");
        chat.add_url_rule("/<room>", Some("room"), room, RuleOptions::new())
            .unwrap();
        let chat = Arc::new(chat);

        let mut sockets: Sockets<()> = Sockets::new();
        sockets
            .register_blueprint(&chat, BlueprintOptions::new())
            .unwrap();

        let matched = sockets
            .url_map()
            .match_path("/chat/general", &Method::GET)
            .unwrap();
        assert_eq!(matched.endpoint, "chat.room");
        assert_eq!(matched.params["room"], "general");
        assert!(sockets.handlers().contains("chat.room"));
        assert_eq!(
            sockets
                .url_map()
                .build_path("chat.room", &[("room", "general")], None, true)
                .unwrap(),
            "/chat/general"
        );
    }

    #[test]
    fn registration_prefix_overrides_blueprint_prefix() {
        let mut chat = Blueprint::<()>::new("chat").with_url_prefix("/chat");
        chat.route("/<room>", room).unwrap();
        let chat = Arc::new(chat);

        let mut sockets: Sockets<()> = Sockets::new();
        sockets
            .register_blueprint(&chat, BlueprintOptions::new().url_prefix("/rooms/"))
            .unwrap();

        assert!(sockets
            .url_map()
            .match_path("/rooms/general", &Method::GET)
            .is_ok());
        assert!(matches!(
            sockets.url_map().match_path("/chat/general", &Method::GET),
            Err(MatchError::NotFound { .. })
        ));
    }

    #[test]
    fn repeat_registration_applies_rules_once() {
        let mut chat = Blueprint::<()>::new("chat");
        chat.route("/lobby", lobby).unwrap();
        let chat = Arc::new(chat);

        let mut sockets: Sockets<()> = Sockets::new();
        sockets
            .register_blueprint(&chat, BlueprintOptions::new())
            .unwrap()
            .register_blueprint(&chat, BlueprintOptions::new())
            .unwrap();

        assert_eq!(sockets.url_map().len(), 1);
        assert_eq!(sockets.blueprints().count(), 1);
    }

    #[test]
    fn invalid_blueprint_rule_adds_nothing() {
        let mut rooms = Blueprint::<()>::new("rooms");
        rooms
            .add_url_rule("/", Some("lobby"), lobby, RuleOptions::new())
            .unwrap()
            .add_url_rule("/<room>", Some("room"), room, RuleOptions::new())
            .unwrap();
        let rooms = Arc::new(rooms);

        let mut sockets: Sockets<()> = Sockets::new();
        let nested = BlueprintOptions::new().url_prefix("/rooms/<room>");
        assert!(matches!(
            sockets.register_blueprint(&rooms, nested),
            Err(ConfigError::InvalidPattern { .. })
        ));
        assert!(sockets.url_map().is_empty());
        assert!(sockets.handlers().is_empty());
        assert_eq!(sockets.blueprints().count(), 0);

        sockets
            .register_blueprint(&rooms, BlueprintOptions::new().url_prefix("/rooms"))
            .unwrap();
        assert_eq!(sockets.url_map().len(), 2);
    }

    #[test]
    fn different_blueprint_with_same_name_collides() {
        let first = Arc::new(Blueprint::<()>::new("chat"));
        let second = Arc::new(Blueprint::<()>::new("chat"));

        let mut sockets: Sockets<()> = Sockets::new();
        sockets
            .register_blueprint(&first, BlueprintOptions::new())
            .unwrap();
        let err = sockets
            .register_blueprint(&second, BlueprintOptions::new())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::BlueprintCollision {
                name: "chat".to_string()
            }
        );
    }

    #[test]
    fn dotted_names_are_rejected() {
        let dotted = Arc::new(Blueprint::<()>::new("chat.v2"));
        let mut sockets: Sockets<()> = Sockets::new();
        assert!(matches!(
            sockets.register_blueprint(&dotted, BlueprintOptions::new()),
            Err(ConfigError::InvalidBlueprintName { .. })
        ));

        let mut chat = Blueprint::<()>::new("chat");
        assert!(matches!(
            chat.add_url_rule("/x", Some("a.b"), room, RuleOptions::new()),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn rebinding_an_endpoint_keeps_both_rules() {
        let mut sockets: Sockets<()> = Sockets::new();
        sockets
            .add_url_rule("/a", Some("shared"), echo, RuleOptions::new())
            .unwrap()
            .add_url_rule("/b", Some("shared"), lobby, RuleOptions::new())
            .unwrap();

        assert_eq!(sockets.url_map().len(), 2);
        assert_eq!(sockets.handlers().len(), 1);
        for path in ["/a", "/b"] {
            let matched = sockets.url_map().match_path(path, &Method::GET).unwrap();
            assert_eq!(matched.endpoint, "shared");
        }
    }
}
