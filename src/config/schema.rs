//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the serverless dispatch engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Raw framing of requests and responses.
    pub framing: FramingConfig,

    /// Dispatch engine limits and defaults.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Framing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Parse buffer for the request line and header block, in bytes.
    pub input_buffer_size: usize,

    /// Write buffer for serialized responses, in bytes.
    pub output_buffer_size: usize,

    /// Prefer an inherited socket on fd 0 over separate stdin/stdout.
    pub use_inherited_channel: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            input_buffer_size: 8192,
            output_buffer_size: 8192,
            use_inherited_channel: true,
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound when a request body has to be buffered for binding.
    pub max_buffered_body: usize,

    /// Character encoding used when writing text bodies.
    pub default_charset: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_buffered_body: 10 * 1024 * 1024,
            default_charset: "utf-8".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Colored log output.
    pub ansi: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ansi: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.framing.input_buffer_size, 8192);
        assert_eq!(config.framing.output_buffer_size, 8192);
        assert!(config.framing.use_inherited_channel);
        assert_eq!(config.dispatch.default_charset, "utf-8");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [framing]
            input_buffer_size = 1024

            [dispatch]
            max_buffered_body = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.framing.input_buffer_size, 1024);
        assert_eq!(config.framing.output_buffer_size, 8192);
        assert_eq!(config.dispatch.max_buffered_body, 4096);
    }
}
