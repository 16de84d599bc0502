//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared with the server, dispatcher, and URL builders
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; route tables are frozen alongside it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, LoadError};
pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, ServerConfig, TimeoutConfig, UrlConfig,
};
pub use validation::{validate_config, ValidationError};
