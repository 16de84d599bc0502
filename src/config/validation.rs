//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Validate URL pieces (schemes, application root)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: {value:?} is not a valid URL scheme")]
    InvalidScheme { field: &'static str, value: String },

    #[error("url.application_root: {0:?} must start with '/'")]
    InvalidApplicationRoot(String),

    #[error("url.server_name: must not be empty or contain '/'")]
    InvalidServerName,

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_body_bytes",
        });
    }

    for (field, value) in [
        ("url.preferred_url_scheme", &config.url.preferred_url_scheme),
        ("url.socket_scheme", &config.url.socket_scheme),
    ] {
        if !is_scheme(value) {
            errors.push(ValidationError::InvalidScheme {
                field,
                value: value.clone(),
            });
        }
    }

    if !config.url.application_root.starts_with('/') {
        errors.push(ValidationError::InvalidApplicationRoot(
            config.url.application_root.clone(),
        ));
    }
    if let Some(server_name) = &config.url.server_name {
        if server_name.is_empty() || server_name.contains('/') {
            errors.push(ValidationError::InvalidServerName);
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
