//! Threaded Sockets
//!
//! WebSocket endpoints routed side by side with an ordinary HTTP application.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http::server ──▶ http::dispatcher ──┬──▶ socket RouteTable ──▶ socket handler
//!                      (request id,     (socket table      │    (upgrade accepted,      (own task,
//!                       trace, timeout)  consulted first)   │     session + span)        owns socket)
//!                                                          │
//!                                                          └──▶ wrapped HTTP app (unchanged response)
//!
//!     URL building (both sides): UrlFor ─▶ DualBuilder ─▶ HTTP table, else socket table as ws://
//! ```
//!
//! Cross-cutting: `config` (TOML), `observability` (tracing, metrics),
//! `lifecycle` (startup, signals, shutdown).

// Core subsystems
pub mod config;
pub mod http;
pub mod registry;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub mod demo;

pub use config::ServerConfig;
pub use http::{ConnectionContext, Dispatcher, HttpRoutes, HttpServer, Upgrade};
pub use lifecycle::Shutdown;
pub use registry::{Blueprint, BlueprintOptions, HandlerResult, Sockets};
pub use routing::{BuildError, ConfigError, MatchError, RouteTable, UrlFor};
