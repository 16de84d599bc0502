//! URL building across the HTTP and socket tables.
//!
//! # Data Flow
//! ```text
//! url_for("chat", room=lobby)
//!     → primary (HTTP) table build
//!         ok  → returned unchanged
//!         err → secondary (socket) table build, forced external, no method
//!               → "ws://" + everything after the first "://"
//!               unknown there too → the primary's error
//! ```

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::routing::error::BuildError;

/// Options for a single build call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Only consider rules that allow this method.
    pub method: Option<Method>,
    /// Produce `scheme://host/...` instead of a root-relative path.
    pub force_external: bool,
    /// Append values the rule does not consume as a query string.
    pub append_unknown: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            method: None,
            force_external: false,
            append_unknown: true,
        }
    }
}

impl BuildOptions {
    pub fn external() -> Self {
        Self {
            force_external: true,
            ..Self::default()
        }
    }
}

/// Strategy for turning an endpoint plus values into a URL.
pub trait UrlBuilder: Send + Sync {
    fn build(
        &self,
        endpoint: &str,
        values: &[(&str, &str)],
        options: &BuildOptions,
    ) -> Result<String, BuildError>;
}

/// Tries `primary`, then falls back to `secondary` with the socket scheme.
#[derive(Debug, Clone)]
pub struct DualBuilder<P, S> {
    primary: P,
    secondary: S,
    socket_scheme: String,
}

impl<P, S> DualBuilder<P, S> {
    pub fn new(primary: P, secondary: S, socket_scheme: impl Into<String>) -> Self {
        Self {
            primary,
            secondary,
            socket_scheme: socket_scheme.into(),
        }
    }

    pub fn socket_scheme(&self) -> &str {
        &self.socket_scheme
    }
}

impl<P: UrlBuilder, S: UrlBuilder> UrlBuilder for DualBuilder<P, S> {
    fn build(
        &self,
        endpoint: &str,
        values: &[(&str, &str)],
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        match self.primary.build(endpoint, values, options) {
            Ok(url) => Ok(url),
            Err(primary_err) => {
                tracing::trace!(
                    endpoint = %endpoint,
                    error = %primary_err,
                    "Primary build failed, trying socket table"
                );

                let socket_options = BuildOptions {
                    method: None,
                    force_external: true,
                    append_unknown: options.append_unknown,
                };
                let url = match self.secondary.build(endpoint, values, &socket_options) {
                    Ok(url) => url,
                    // The primary knows the endpoint; its failure is the useful one.
                    Err(BuildError::UnknownEndpoint { .. }) => return Err(primary_err),
                    Err(err) => return Err(err),
                };
                let rest = url.split_once("://").map_or(url.as_str(), |(_, rest)| rest);
                Ok(format!("{}://{rest}", self.socket_scheme))
            }
        }
    }
}

/// Request-bound URL builder handed to HTTP and socket handlers.
///
/// Inserted into request extensions by the dispatcher, so an axum handler can
/// take `Extension<UrlFor>`.
#[derive(Clone)]
pub struct UrlFor(Arc<dyn UrlBuilder>);

impl UrlFor {
    pub fn new(builder: impl UrlBuilder + 'static) -> Self {
        Self(Arc::new(builder))
    }

    /// Root-relative URL (or socket URL) for `endpoint`, unknown values as query.
    pub fn url_for(&self, endpoint: &str, values: &[(&str, &str)]) -> Result<String, BuildError> {
        self.0.build(endpoint, values, &BuildOptions::default())
    }

    /// Absolute URL for `endpoint`.
    pub fn external_url_for(
        &self,
        endpoint: &str,
        values: &[(&str, &str)],
    ) -> Result<String, BuildError> {
        self.0.build(endpoint, values, &BuildOptions::external())
    }
}

impl UrlBuilder for UrlFor {
    fn build(
        &self,
        endpoint: &str,
        values: &[(&str, &str)],
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        self.0.build(endpoint, values, options)
    }
}

impl fmt::Debug for UrlFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFor").finish_non_exhaustive()
    }
}
