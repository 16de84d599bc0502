//! Per-connection context handed to socket handlers.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap, Uri};
use axum_extra::extract::cookie::CookieJar;

use crate::http::session::SessionId;
use crate::routing::{BuildError, UrlFor};

/// Everything a socket handler knows about the request that opened it.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    session_id: SessionId,
    endpoint: String,
    params: HashMap<String, String>,
    cookies: Option<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    request_id: Option<String>,
    urls: Option<UrlFor>,
}

impl ConnectionContext {
    /// A context with no request behind it.
    pub fn new(endpoint: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self {
            session_id: SessionId::new(),
            endpoint: endpoint.into(),
            params,
            cookies: None,
            uri: Uri::default(),
            headers: HeaderMap::new(),
            remote_addr: None,
            request_id: None,
            urls: None,
        }
    }

    pub(crate) fn from_request(
        session_id: SessionId,
        endpoint: String,
        params: HashMap<String, String>,
        parts: &Parts,
        urls: UrlFor,
    ) -> Self {
        Self {
            session_id,
            endpoint,
            params,
            cookies: parse_cookies(&parts.headers),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            request_id: parts
                .headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            urls: Some(urls),
        }
    }

    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Endpoint of the socket rule that matched.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Cookies sent with the upgrade request; `None` if there was no Cookie header.
    pub fn cookies(&self) -> Option<&HashMap<String, String>> {
        self.cookies.as_ref()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.as_ref()?.get(name).map(String::as_str)
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Build a URL for any HTTP or socket endpoint.
    pub fn url_for(&self, endpoint: &str, values: &[(&str, &str)]) -> Result<String, BuildError> {
        match &self.urls {
            Some(urls) => urls.url_for(endpoint, values),
            None => Err(BuildError::UnknownEndpoint {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    pub fn urls(&self) -> Option<&UrlFor> {
        self.urls.as_ref()
    }
}

/// Parse the Cookie header(s) into a name/value map.
pub fn parse_cookies(headers: &HeaderMap) -> Option<HashMap<String, String>> {
    if !headers.contains_key(axum::http::header::COOKIE) {
        return None;
    }
    let jar = CookieJar::from_headers(headers);
    Some(
        jar.iter()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn cookies_are_parsed_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=abc; theme=dark"));

        let cookies = parse_cookies(&headers).unwrap();
        assert_eq!(cookies["session"], "abc");
        assert_eq!(cookies["theme"], "dark");
    }

    #[test]
    fn missing_cookie_header_is_none() {
        assert!(parse_cookies(&HeaderMap::new()).is_none());
    }

    #[test]
    fn unbound_context_cannot_build_urls() {
        let cx = ConnectionContext::new("echo", HashMap::new());
        assert!(matches!(
            cx.url_for("echo", &[]),
            Err(BuildError::UnknownEndpoint { .. })
        ));
        assert!(cx.cookie("session").is_none());
        assert_eq!(cx.endpoint(), "echo");
    }
}
