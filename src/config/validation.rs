//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, chunk sizes > 0)
//! - Reject reserved upload keys and keys the engine does not act on in
//!   the default engine options
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeMap;

use tracing_subscriber::EnvFilter;

use crate::config::schema::{ClientConfig, LogFormat};
use crate::engine::EngineOptions;
use crate::error::ConfigurationError;
use crate::transfer::options::is_reserved;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.engine.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("engine.connect_timeout_ms", "must be greater than 0"));
    }
    if config.engine.poll_interval_ms == 0 {
        errors.push(ValidationError::new("engine.poll_interval_ms", "must be greater than 0"));
    }

    if config.defaults.timeout_ms == Some(0) {
        errors.push(ValidationError::new("defaults.timeout_ms", "must be greater than 0"));
    }
    if config.defaults.upload_chunk_size == Some(0) {
        errors.push(ValidationError::new("defaults.upload_chunk_size", "must be greater than 0"));
    }
    for (key, value) in &config.defaults.engine {
        let field = format!("defaults.engine.{key}");
        if is_reserved(key) {
            errors.push(ValidationError::new(field, "is managed internally and cannot be configured"));
            continue;
        }
        match EngineOptions::parse(&BTreeMap::from([(key.clone(), value.clone())])) {
            Ok(_) => {}
            Err(ConfigurationError::UnknownEngineOption(_)) => errors.push(ValidationError::new(
                field,
                format!("unknown engine option, expected one of: {}", EngineOptions::KEYS.join(", ")),
            )),
            Err(err) => errors.push(ValidationError::new(field, err.to_string())),
        }
    }

    if config.sink.memory_limit_bytes == 0 {
        errors.push(ValidationError::new("sink.memory_limit_bytes", "must be greater than 0"));
    }

    if let Err(err) = config.observability.log_format.parse::<LogFormat>() {
        errors.push(ValidationError::new("observability.log_format", err));
    }
    if let Err(err) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter: {err}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
