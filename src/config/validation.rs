//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.listener.server_name.is_empty() {
        errors.push(ValidationError::new("listener.server_name", "must not be empty"));
    }

    if config.content.public_dir.is_empty() {
        errors.push(ValidationError::new("content.public_dir", "must not be empty"));
    }

    let bypass = &config.content.bypass_param;
    if bypass.is_empty() || bypass.contains(['&', '=']) {
        errors.push(ValidationError::new(
            "content.bypass_param",
            "must be a non-empty query key without '&' or '='",
        ));
    }

    if config.registrar.socket_path.is_empty() {
        errors.push(ValidationError::new("registrar.socket_path", "must not be empty"));
    }

    if config.registrar.app_topic.is_empty() {
        errors.push(ValidationError::new("registrar.app_topic", "must not be empty"));
    }

    if config.registrar.timeout_ms == 0 {
        errors.push(ValidationError::new("registrar.timeout_ms", "must be greater than 0"));
    }

    if config.registrar.reconnect_base_ms > config.registrar.reconnect_max_ms {
        errors.push(ValidationError::new(
            "registrar.reconnect_base_ms",
            "must not exceed registrar.reconnect_max_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
