//! Routing error taxonomy.
//!
//! - [`ConfigError`]: registration-time mistakes. Fatal; abort startup.
//! - [`MatchError`]: no rule claims a request. Recoverable at dispatch time.
//! - [`BuildError`]: a URL could not be produced for an endpoint.

use axum::http::Method;
use thiserror::Error;

/// Invalid route table or registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid rule pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("cannot derive an endpoint name from handler `{type_name}`; pass one explicitly")]
    AnonymousHandler { type_name: String },

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid blueprint name {name:?}: {reason}")]
    InvalidBlueprintName { name: String, reason: String },

    #[error(
        "blueprint name collision: a different blueprint is already registered as {name:?}; \
         blueprints created on the fly need unique names"
    )]
    BlueprintCollision { name: String },

    #[error("rule {pattern:?} overlaps the already served {existing:?}")]
    RouteConflict { pattern: String, existing: String },

    #[error("method {method} cannot be served by rule {pattern:?}")]
    UnroutableMethod { pattern: String, method: Method },
}

impl ConfigError {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// No rule in a table claims the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("no rule matches {path}")]
    NotFound { path: String },

    #[error("{method} not allowed for {path}")]
    MethodNotAllowed {
        path: String,
        method: Method,
        allowed: Vec<Method>,
    },
}

/// A URL could not be built for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("could not build url for endpoint {endpoint:?}: no such endpoint")]
    UnknownEndpoint { endpoint: String },

    #[error(
        "could not build url for endpoint {endpoint:?} with values {provided:?}: \
         no rule accepts them"
    )]
    Unsatisfiable {
        endpoint: String,
        provided: Vec<String>,
        method: Option<Method>,
    },

    #[error("could not build external url for endpoint {endpoint:?}: no server name bound")]
    MissingServerName { endpoint: String },
}

impl BuildError {
    /// The endpoint the failed build was for.
    pub fn endpoint(&self) -> &str {
        match self {
            BuildError::UnknownEndpoint { endpoint }
            | BuildError::Unsatisfiable { endpoint, .. }
            | BuildError::MissingServerName { endpoint } => endpoint,
        }
    }
}
