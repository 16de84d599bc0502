//! HTTP and socket protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → dispatcher.rs (socket table first)
//!         → websocket.rs (detect / accept / refuse the upgrade)
//!         → session.rs + context.rs (per-socket session and handler context)
//!         → or the wrapped HTTP app, with a request-bound UrlFor
//!           (routes.rs declares its rules once for serving and building)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatcher;
pub mod routes;
pub mod server;
pub mod session;
pub mod websocket;

pub use context::ConnectionContext;
pub use dispatcher::Dispatcher;
pub use routes::HttpRoutes;
pub use server::HttpServer;
pub use session::{SessionGuard, SessionId, SessionTracker};
pub use websocket::Upgrade;
