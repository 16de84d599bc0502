//! A single pattern-to-endpoint binding.

use std::collections::BTreeMap;

use axum::http::Method;

use crate::routing::error::ConfigError;
use crate::routing::pattern::Pattern;

/// Extra matching options for a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOptions {
    /// Allowed methods. `None` accepts any method.
    pub methods: Option<Vec<Method>>,
    /// Values merged into match results and used to satisfy builds.
    pub defaults: BTreeMap<String, String>,
}

impl RuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the rule to the given methods.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    /// Add a default value.
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }
}

/// A compiled rule. Immutable once added to a table.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Pattern,
    endpoint: String,
    methods: Option<Vec<Method>>,
    defaults: BTreeMap<String, String>,
}

impl Rule {
    pub fn new(pattern: &str, endpoint: &str, options: RuleOptions) -> Result<Self, ConfigError> {
        let pattern = Pattern::parse(pattern)?;

        // GET implies HEAD.
        let methods = options.methods.map(|mut methods| {
            if methods.contains(&Method::GET) && !methods.contains(&Method::HEAD) {
                methods.push(Method::HEAD);
            }
            methods
        });

        Ok(Self {
            pattern,
            endpoint: endpoint.to_string(),
            methods,
            defaults: options.defaults,
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn methods(&self) -> Option<&[Method]> {
        self.methods.as_deref()
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |methods| methods.contains(method))
    }

    /// Whether a build with these values (and optional method) can use this rule.
    pub(crate) fn suitable_for(&self, values: &[(&str, &str)], method: Option<&Method>) -> bool {
        if let Some(method) = method {
            if !self.allows(method) {
                return false;
            }
        }

        let conflicts_with_default = self.defaults.iter().any(|(key, default)| {
            lookup(values, key).is_some_and(|value| value != default.as_str())
        });
        if conflicts_with_default {
            return false;
        }

        self.pattern
            .arguments()
            .all(|arg| lookup(values, arg).is_some() || self.defaults.contains_key(arg))
    }

    /// Render this rule's path and the leftover query pairs.
    pub(crate) fn build<'v>(
        &self,
        values: &[(&'v str, &'v str)],
        append_unknown: bool,
    ) -> Option<(String, Vec<(&'v str, &'v str)>)> {
        let path = self.pattern.render(|name| {
            lookup(values, name).or_else(|| self.defaults.get(name).map(String::as_str))
        })?;

        let query = if append_unknown {
            values
                .iter()
                .filter(|(key, _)| !self.pattern.has_argument(key) && !self.defaults.contains_key(*key))
                .copied()
                .collect()
        } else {
            Vec::new()
        };

        Some((path, query))
    }
}

pub(crate) fn lookup<'v>(values: &[(&'v str, &'v str)], key: &str) -> Option<&'v str> {
    values
        .iter()
        .rev()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}
