//! Reusable, named bundles of socket rules.

use std::fmt;
use std::sync::Arc;

use crate::registry::handler::{endpoint_from_handler, validate_endpoint, BoxedHandler, SocketHandler};
use crate::registry::sockets::Sockets;
use crate::routing::{ConfigError, Pattern, Rule, RuleOptions};

/// Options applied when a blueprint is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlueprintOptions {
    /// Overrides the blueprint's own URL prefix.
    pub url_prefix: Option<String>,
}

impl BlueprintOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }
}

struct DeferredRule<S> {
    pattern: String,
    endpoint: String,
    handler: BoxedHandler<S>,
    options: RuleOptions,
}

/// Rules and handlers not yet bound to a table.
///
/// Registered endpoints are namespaced as `"{blueprint}.{endpoint}"` and
/// patterns are joined under the URL prefix.
pub struct Blueprint<S> {
    name: String,
    url_prefix: Option<String>,
    deferred: Vec<DeferredRule<S>>,
}

impl<S: Send + 'static> Blueprint<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_prefix: None,
            deferred: Vec::new(),
        }
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    /// Number of deferred rules.
    pub fn len(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }

    /// Defer a rule whose endpoint is derived from the handler's name.
    pub fn route<H: SocketHandler<S>>(
        &mut self,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigError> {
        self.add_url_rule(pattern, None, handler, RuleOptions::new())
    }

    /// Defer a rule. The pattern is checked now so mistakes surface at the
    /// call site rather than at registration.
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
        validate_endpoint(&endpoint)?;
        if endpoint.contains('.') {
            return Err(ConfigError::InvalidEndpoint {
                endpoint,
                reason: "blueprint endpoints may not contain '.'".to_string(),
            });
        }
        Pattern::parse(pattern)?;

        self.deferred.push(DeferredRule {
            pattern: pattern.to_string(),
            endpoint,
            handler: Arc::new(handler),
            options,
        });
        Ok(self)
    }

    /// Apply the deferred rules to `sockets`.
    ///
    /// Rules are applied on the first registration only; a repeat
    /// registration of the same blueprint is a no-op.
    pub(crate) fn register(
        &self,
        sockets: &mut Sockets<S>,
        options: &BlueprintOptions,
        first_registration: bool,
    ) -> Result<(), ConfigError> {
        if !first_registration {
            tracing::debug!(
                blueprint = %self.name,
                "Blueprint already registered; rules not reapplied"
            );
            return Ok(());
        }

        let prefix = options.url_prefix.as_deref().or(self.url_prefix.as_deref());

        // Every joined rule must be valid before any is added.
        let prepared = self
            .deferred
            .iter()
            .map(|rule| {
                let pattern = join_prefix(prefix, &rule.pattern);
                let endpoint = format!("{}.{}", self.name, rule.endpoint);
                Rule::new(&pattern, &endpoint, rule.options.clone())?;
                Ok((pattern, endpoint, rule))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for (pattern, endpoint, rule) in prepared {
            sockets.add_boxed_rule(
                &pattern,
                &endpoint,
                Arc::clone(&rule.handler),
                rule.options.clone(),
            )?;
        }

        tracing::info!(
            blueprint = %self.name,
            prefix = ?prefix,
            rules = self.deferred.len(),
            "Blueprint registered"
        );
        Ok(())
    }
}

impl<S> fmt::Debug for Blueprint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("url_prefix", &self.url_prefix)
            .field(
                "rules",
                &self
                    .deferred
                    .iter()
                    .map(|r| (r.pattern.as_str(), r.endpoint.as_str()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn join_prefix(prefix: Option<&str>, pattern: &str) -> String {
    match prefix {
        Some(prefix) => format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            pattern.trim_start_matches('/')
        ),
        None => pattern.to_string(),
    }
}
