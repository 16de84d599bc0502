//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{request::Parts, StatusCode};
use axum::response::Response;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use threaded_sockets::config::ServerConfig;
use threaded_sockets::http::{HttpServer, Upgrade};
use threaded_sockets::lifecycle::Shutdown;

/// In-memory stand-in for an upgradable connection.
///
/// Present in request extensions when the "client" asked for an upgrade.
#[derive(Clone)]
pub struct MockTransport {
    events: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            events,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (transport, rx)
    }

    /// Report something from inside a handler.
    pub fn send(&self, event: impl Into<String>) {
        let _ = self.events.send(event.into());
    }

    /// Whether the pending upgrade was refused.
    pub fn was_refused(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockUpgrade(MockTransport);

impl Upgrade for MockUpgrade {
    type Socket = MockTransport;

    async fn detect(parts: &mut Parts) -> Option<Self> {
        parts.extensions.remove::<MockTransport>().map(MockUpgrade)
    }

    fn accept<F, Fut>(self, callback: F) -> Response
    where
        F: FnOnce(MockTransport) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(callback(self.0));
        Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .body(Body::empty())
            .unwrap()
    }

    fn close(self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }
}

/// Wait for the next handler event, failing the test after a second.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for handler")
        .expect("handler channel closed")
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

/// Start the demo application on 127.0.0.1 with an OS-assigned port.
pub async fn start_demo_server() -> TestServer {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.shutdown_grace_secs = 1;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let dispatcher = threaded_sockets::demo::dispatcher(&config).unwrap();
    let server = HttpServer::new(config, dispatcher);

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}
