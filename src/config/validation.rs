//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer sizes, body limit, log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::EngineConfig;

/// Smallest parse buffer that still holds a minimal request line.
pub const MIN_BUFFER_SIZE: usize = 64;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a config value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.framing.input_buffer_size < MIN_BUFFER_SIZE {
        errors.push(ValidationError {
            field: "framing.input_buffer_size",
            message: format!("must be at least {MIN_BUFFER_SIZE}"),
        });
    }
    if config.framing.output_buffer_size == 0 {
        errors.push(ValidationError {
            field: "framing.output_buffer_size",
            message: "must be greater than 0".into(),
        });
    }
    if config.dispatch.max_buffered_body == 0 {
        errors.push(ValidationError {
            field: "dispatch.max_buffered_body",
            message: "must be greater than 0".into(),
        });
    }
    if !config.dispatch.default_charset.eq_ignore_ascii_case("utf-8")
        && !config.dispatch.default_charset.eq_ignore_ascii_case("utf8")
    {
        errors.push(ValidationError {
            field: "dispatch.default_charset",
            message: format!("unsupported charset {:?}", config.dispatch.default_charset),
        });
    }
    // Directive strings such as "info,serverless_dispatch=debug" are accepted
    // as long as the global level is known.
    let level = config
        .observability
        .log_level
        .split(',')
        .find(|part| !part.contains('='))
        .unwrap_or("info")
        .trim();
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError {
            field: "observability.log_level",
            message: format!("unknown level {level:?}"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
