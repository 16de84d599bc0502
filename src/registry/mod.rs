//! Socket handler registration subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Sockets::route / add_url_rule (pattern, endpoint, handler)
//!     Blueprint::route → register_blueprint (prefix + "name.endpoint")
//!     → socket RouteTable + HandlerRegistry
//!     → into_parts() → frozen into the Dispatcher
//! ```
//!
//! # Design Decisions
//! - One registry per socket table; the HTTP app keeps its own handlers
//! - Endpoint names default to the handler's function name
//! - Blueprints apply their rules once, however often they are registered

pub mod blueprint;
pub mod handler;
pub mod sockets;

pub use blueprint::{Blueprint, BlueprintOptions};
pub use handler::{
    endpoint_from_handler, BoxedHandler, HandlerError, HandlerRegistry, HandlerResult,
    SocketHandler,
};
pub use sockets::Sockets;
