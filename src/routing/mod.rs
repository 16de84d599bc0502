//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, method)
//!     → table.rs (specificity-ordered lookup)
//!     → pattern.rs (regex match, decode parameters)
//!     → Return: RouteMatch or MatchError
//!
//! URL building:
//!     endpoint + values
//!     → builder.rs (DualBuilder: HTTP table, then socket table)
//!     → table.rs (BoundTable: server name, script root, scheme)
//! ```
//!
//! # Design Decisions
//! - Rules compiled at registration, tables immutable while serving
//! - Deterministic: same input always matches same rule
//! - Most specific rule wins; insertion order breaks ties

pub mod builder;
pub mod error;
pub mod pattern;
pub mod rule;
pub mod table;

pub use builder::{BuildOptions, DualBuilder, UrlBuilder, UrlFor};
pub use error::{BuildError, ConfigError, MatchError};
pub use pattern::{Converter, Pattern};
pub use rule::{Rule, RuleOptions};
pub use table::{BoundTable, RouteMatch, RouteTable, UrlContext};
