//! Upgrade detection and acceptance.
//!
//! # Responsibilities
//! - Detect whether a request asks for a protocol upgrade
//! - Complete the handshake and hand the socket to a callback
//! - Release an upgrade nobody will serve
//!
//! # Design Decisions
//! - Detection is a trait so the dispatcher can be driven without a real
//!   connection in tests
//! - The WebSocket implementation wraps axum's `WebSocketUpgrade`

use std::future::Future;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;

/// A pending protocol upgrade found on a request.
pub trait Upgrade: Sized + Send + 'static {
    /// The transport handed to socket handlers once accepted.
    type Socket: Send + 'static;

    /// Inspect the request head. `None` means this is an ordinary request.
    fn detect(parts: &mut Parts) -> impl Future<Output = Option<Self>> + Send;

    /// Complete the handshake. `callback` runs once the connection switches.
    fn accept<F, Fut>(self, callback: F) -> Response
    where
        F: FnOnce(Self::Socket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static;

    /// Abandon the upgrade; the request is served as plain HTTP instead.
    fn close(self);
}

impl Upgrade for WebSocketUpgrade {
    type Socket = WebSocket;

    async fn detect(parts: &mut Parts) -> Option<Self> {
        WebSocketUpgrade::from_request_parts(parts, &()).await.ok()
    }

    fn accept<F, Fut>(self, callback: F) -> Response
    where
        F: FnOnce(WebSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_failed_upgrade(|error| {
            tracing::warn!(error = %error, "WebSocket upgrade failed");
        })
        .on_upgrade(callback)
    }

    fn close(self) {
        tracing::debug!("Unrouted WebSocket upgrade released");
    }
}
