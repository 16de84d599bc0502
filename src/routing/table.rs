//! Route tables and URL-context binding.
//!
//! # Responsibilities
//! - Store rules in insertion order with a reverse index by endpoint
//! - Match a path/method to an endpoint and its parameters
//! - Build a path (and query) for an endpoint from parameter values
//! - Bind a table to a server name, script root, and scheme for full URLs
//!
//! # Design Decisions
//! - Rules are sorted by specificity once, at `add` time; the sort is stable
//!   so ties keep insertion order (first added wins)
//! - Duplicate endpoint names are accepted; every rule stays resolvable
//! - Tables are frozen behind `Arc` once serving starts

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, request::Parts, Method};

use crate::config::UrlConfig;
use crate::routing::builder::{BuildOptions, UrlBuilder};
use crate::routing::error::{BuildError, ConfigError, MatchError};
use crate::routing::rule::{Rule, RuleOptions};

/// Result of matching a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Endpoint of the winning rule.
    pub endpoint: String,
    /// Decoded path parameters merged over the rule's defaults.
    pub params: HashMap<String, String>,
}

/// Ordered collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<Rule>,
    /// Rule indices in match order.
    order: Vec<usize>,
    by_endpoint: HashMap<String, Vec<usize>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule binding `pattern` to `endpoint`.
    pub fn add(
        &mut self,
        pattern: &str,
        endpoint: &str,
        options: RuleOptions,
    ) -> Result<(), ConfigError> {
        let rule = Rule::new(pattern, endpoint, options)?;
        let index = self.rules.len();

        if self.by_endpoint.contains_key(endpoint) {
            tracing::debug!(
                endpoint = %endpoint,
                pattern = %pattern,
                "Endpoint already has a rule; both remain resolvable"
            );
        }

        self.by_endpoint
            .entry(endpoint.to_string())
            .or_default()
            .push(index);
        self.rules.push(rule);
        self.order.push(index);

        let rules = &self.rules;
        self.order
            .sort_by(|a, b| rules[*a].pattern().key().cmp(rules[*b].pattern().key()));

        tracing::trace!(endpoint = %endpoint, pattern = %pattern, "Rule added");
        Ok(())
    }

    /// Rules in insertion order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains_endpoint(&self, endpoint: &str) -> bool {
        self.by_endpoint.contains_key(endpoint)
    }

    /// Match a raw request path and method.
    pub fn match_path(&self, path: &str, method: &Method) -> Result<RouteMatch, MatchError> {
        let mut allowed: Vec<Method> = Vec::new();

        for &index in &self.order {
            let rule = &self.rules[index];
            let Some(values) = rule.pattern().captures(path) else {
                continue;
            };

            if !rule.allows(method) {
                for m in rule.methods().unwrap_or_default() {
                    if !allowed.contains(m) {
                        allowed.push(m.clone());
                    }
                }
                continue;
            }

            let mut params: HashMap<String, String> = rule
                .defaults()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            params.extend(values);

            return Ok(RouteMatch {
                endpoint: rule.endpoint().to_string(),
                params,
            });
        }

        if allowed.is_empty() {
            Err(MatchError::NotFound {
                path: path.to_string(),
            })
        } else {
            Err(MatchError::MethodNotAllowed {
                path: path.to_string(),
                method: method.clone(),
                allowed,
            })
        }
    }

    /// Build the path (plus query, if any) for an endpoint.
    ///
    /// Rules registered under the endpoint are tried in insertion order; the
    /// first one the values satisfy wins.
    pub fn build_path(
        &self,
        endpoint: &str,
        values: &[(&str, &str)],
        method: Option<&Method>,
        append_unknown: bool,
    ) -> Result<String, BuildError> {
        let indices = self
            .by_endpoint
            .get(endpoint)
            .ok_or_else(|| BuildError::UnknownEndpoint {
                endpoint: endpoint.to_string(),
            })?;

        for &index in indices {
            let rule = &self.rules[index];
            if !rule.suitable_for(values, method) {
                continue;
            }
            let Some((path, query)) = rule.build(values, append_unknown) else {
                continue;
            };

            if query.is_empty() {
                return Ok(path);
            }
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            return Ok(format!("{path}?{query}"));
        }

        Err(BuildError::Unsatisfiable {
            endpoint: endpoint.to_string(),
            provided: values.iter().map(|(k, _)| k.to_string()).collect(),
            method: method.cloned(),
        })
    }
}

/// Where built URLs live: host, mount point, and scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlContext {
    pub server_name: Option<String>,
    pub script_name: String,
    pub url_scheme: String,
}

impl UrlContext {
    /// Context for building outside a request. Needs a configured server name.
    pub fn from_config(config: &UrlConfig) -> Option<Self> {
        let server_name = config.server_name.clone()?;
        Some(Self {
            server_name: Some(server_name),
            script_name: config.application_root.clone(),
            url_scheme: config.preferred_url_scheme.clone(),
        })
    }

    /// Context for the request being served.
    ///
    /// A configured server name takes precedence over the request's host.
    /// Paths are built from the root the request was matched against, so
    /// `application_root` does not apply here.
    pub fn for_request(parts: &Parts, config: &UrlConfig) -> Self {
        let server_name = config.server_name.clone().or_else(|| {
            parts
                .headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        });
        let url_scheme = parts
            .uri
            .scheme_str()
            .unwrap_or(&config.preferred_url_scheme)
            .to_string();

        Self {
            server_name,
            script_name: String::new(),
            url_scheme,
        }
    }
}

/// A route table bound to a [`UrlContext`].
#[derive(Debug, Clone)]
pub struct BoundTable {
    table: Arc<RouteTable>,
    context: UrlContext,
}

impl BoundTable {
    pub fn new(table: Arc<RouteTable>, context: UrlContext) -> Self {
        Self { table, context }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn context(&self) -> &UrlContext {
        &self.context
    }
}

impl UrlBuilder for BoundTable {
    fn build(
        &self,
        endpoint: &str,
        values: &[(&str, &str)],
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        let path = self.table.build_path(
            endpoint,
            values,
            options.method.as_ref(),
            options.append_unknown,
        )?;
        let root = self.context.script_name.trim_end_matches('/');

        if !options.force_external {
            return Ok(format!("{root}{path}"));
        }

        let server_name =
            self.context
                .server_name
                .as_deref()
                .ok_or_else(|| BuildError::MissingServerName {
                    endpoint: endpoint.to_string(),
                })?;
        Ok(format!(
            "{}://{server_name}{root}{path}",
            self.context.url_scheme
        ))
    }
}
