//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges (timeouts > 0, ports valid)
//! - Check that response defaults parse the same way query overrides do
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EchoConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::EchoConfig;
use crate::echo::codes::CodeSpec;
use crate::echo::params::{parse_header_list, parse_proxy_target};

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &EchoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be non-zero"));
    }
    if let Some(tls) = &listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path must both be set",
            ));
        }
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.read_ms", timeouts.read_ms),
        ("timeouts.write_ms", timeouts.write_ms),
        ("timeouts.idle_ms", timeouts.idle_ms),
        ("timeouts.proxy_ms", timeouts.proxy_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be non-zero"));
        }
    }

    let response = &config.response;
    if response.codes.is_empty() {
        errors.push(ValidationError::new("response.codes", "random code pool is empty"));
    }
    if let Err(e) = response.code.parse::<CodeSpec>() {
        errors.push(ValidationError::new("response.code", e.to_string()));
    }
    if let Err(e) = parse_header_list(response.headers.iter().map(String::as_str)) {
        errors.push(ValidationError::new("response.headers", e.to_string()));
    }
    if response.max_body_bytes == 0 {
        errors.push(ValidationError::new("response.max_body_bytes", "must be non-zero"));
    }

    if let Some(target) = &config.proxy.target {
        if let Err(e) = parse_proxy_target(target) {
            errors.push(ValidationError::new("proxy.target", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
