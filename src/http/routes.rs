//! HTTP endpoints declared once for serving and URL building.
//!
//! Each rule goes into the build [`RouteTable`] and the axum [`Router`] from
//! the same pattern, so an endpoint the app serves is always buildable and
//! the other way round.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::handler::Handler;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{self as axum_routing, MethodFilter};
use axum::Router;

use crate::routing::{ConfigError, Pattern, RouteTable, RuleOptions};

/// HTTP rules registered in a build table and an axum router together.
pub struct HttpRoutes<S = ()> {
    table: RouteTable,
    router: Router<S>,
    /// Served axum path shape → pattern that claimed it.
    served: HashMap<String, String>,
}

impl<S: Clone + Send + Sync + 'static> HttpRoutes<S> {
    pub fn new() -> Self {
        Self {
            table: RouteTable::new(),
            router: Router::new(),
            served: HashMap::new(),
        }
    }

    pub fn get<H, T>(self, pattern: &str, endpoint: &str, handler: H) -> Result<Self, ConfigError>
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(pattern, endpoint, [Method::GET], handler)
    }

    /// Serve `handler` at `pattern` and make `endpoint` buildable.
    ///
    /// An empty method list accepts any method. Converters are enforced on
    /// the matched path; a value they reject falls through as not found.
    pub fn route<H, T>(
        mut self,
        pattern: &str,
        endpoint: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: H,
    ) -> Result<Self, ConfigError>
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let methods: Vec<Method> = methods.into_iter().collect();
        let compiled = Pattern::parse(pattern)?;
        let path = compiled.to_axum_path()?;

        let shape = path_shape(&path);
        if let Some(existing) = self.served.get(&shape) {
            return Err(ConfigError::RouteConflict {
                pattern: pattern.to_string(),
                existing: existing.clone(),
            });
        }

        let mut filter: Option<MethodFilter> = None;
        for method in &methods {
            let single = MethodFilter::try_from(method.clone()).map_err(|_| {
                ConfigError::UnroutableMethod {
                    pattern: pattern.to_string(),
                    method: method.clone(),
                }
            })?;
            filter = Some(filter.map_or(single, |filter| filter.or(single)));
        }
        let method_router = match filter {
            Some(filter) => axum_routing::on(filter, handler),
            None => axum_routing::any(handler),
        };

        let options = if methods.is_empty() {
            RuleOptions::new()
        } else {
            RuleOptions::new().methods(methods)
        };
        self.table.add(pattern, endpoint, options)?;

        self.router = self.router.route(
            &path,
            method_router.route_layer(middleware::from_fn_with_state(
                Arc::new(compiled),
                enforce_converters,
            )),
        );
        self.served.insert(shape, pattern.to_string());

        tracing::debug!(endpoint = %endpoint, pattern = %pattern, path = %path, "HTTP rule registered");
        Ok(self)
    }

    /// The build table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn into_parts(self) -> (RouteTable, Router<S>) {
        (self.table, self.router)
    }
}

impl<S: Clone + Send + Sync + 'static> Default for HttpRoutes<S> {
    fn default() -> Self {
        Self::new()
    }
}

async fn enforce_converters(
    State(pattern): State<Arc<Pattern>>,
    request: Request,
    next: Next,
) -> Response {
    if pattern.matches(request.uri().path()) {
        next.run(request).await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// `path` with variable names erased; equal shapes collide in axum.
fn path_shape(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        shape.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(escaped) = after.strip_prefix('{') {
            shape.push_str("{{");
            rest = escaped;
            continue;
        }
        let close = after.find('}').unwrap_or(after.len());
        shape.push_str(if after.starts_with('*') { "{*}" } else { "{}" });
        rest = after.get(close + 1..).unwrap_or("");
    }
    shape.push_str(rest);
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::Path;
    use tower::ServiceExt;

    async fn room(Path(room): Path<String>) -> String {
        room
    }

    async fn page(Path(page): Path<u32>) -> String {
        format!("page {page}")
    }

    async fn file(Path(file): Path<String>) -> String {
        file
    }

    fn routes() -> HttpRoutes {
        HttpRoutes::new()
            .get("/rooms/<room>", "room", room)
            .unwrap()
            .get("/feed/<int:page>", "feed", page)
            .unwrap()
            .route("/files/<path:file>", "file", Vec::<Method>::new(), file)
            .unwrap()
    }

    async fn call(router: &Router, method: Method, path: &str) -> (StatusCode, String) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn every_rule_is_served_and_buildable() {
        let (table, router) = routes().into_parts();

        for (endpoint, values, expected) in [
            ("room", [("room", "general")], "general"),
            ("feed", [("page", "3")], "page 3"),
            ("file", [("file", "a/b.txt")], "a/b.txt"),
        ] {
            let path = table.build_path(endpoint, &values, None, true).unwrap();
            let (status, body) = call(&router, Method::GET, &path).await;
            assert_eq!(status, StatusCode::OK, "{path}");
            assert_eq!(body, expected);
        }
    }

    #[tokio::test]
    async fn converters_and_methods_are_enforced() {
        let (_, router) = routes().into_parts();

        assert_eq!(call(&router, Method::GET, "/feed/next").await.0, StatusCode::NOT_FOUND);
        assert_eq!(
            call(&router, Method::POST, "/rooms/general").await.0,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(call(&router, Method::DELETE, "/files/x").await.0, StatusCode::OK);
    }

    #[test]
    fn overlapping_rules_are_rejected() {
        let result = routes().get("/rooms/<name>", "other_room", room);
        assert!(matches!(result, Err(ConfigError::RouteConflict { .. })));
    }

    #[test]
    fn shapes_ignore_variable_names() {
        assert_eq!(path_shape("/rooms/{room}"), "/rooms/{}");
        assert_eq!(path_shape("/files/{*file}"), "/files/{*}");
        assert_eq!(path_shape("/a/{{literal}}"), "/a/{{literal}}");
    }
}
