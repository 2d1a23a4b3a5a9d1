//! Body codecs.
//!
//! # Data Flow
//! ```text
//! request body bytes + Content-Type
//!     → registry.rs (decoder for the media type)
//!     → serde_json::Value handed to argument binding
//!
//! response Payload + Content-Type
//!     → registry.rs (encoder for media type and payload kind)
//!     → encoded bytes
//! ```
//!
//! # Design Decisions
//! - Decoding always produces a `serde_json::Value`; handlers convert it to
//!   their own types with serde
//! - Custom codecs are consulted before the built-in ones so applications can
//!   encode opaque `Payload::Object` values
//! - No encoder is a hard error, never a silently dropped body

pub mod form;
pub mod json;
pub mod registry;
pub mod text;

pub use form::FormCodec;
pub use json::JsonCodec;
pub use registry::CodecRegistry;
pub use text::TextCodec;

use bytes::Bytes;
use thiserror::Error;

use crate::http::{MediaType, Payload};

/// Errors raised while encoding or decoding bodies.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Cannot encode value of type [{type_name}]. No possible encoders found for media type: {media_type}")]
    NoEncoder {
        media_type: String,
        type_name: &'static str,
    },

    #[error("No decoder found for media type: {media_type}")]
    NoDecoder { media_type: String },

    #[error("Error encoding body: {0}")]
    Encode(String),

    #[error("Error decoding body: {0}")]
    Decode(String),
}

/// Encoder/decoder for one family of media types.
pub trait MediaTypeCodec: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this codec handles `media_type`.
    fn supports(&self, media_type: &MediaType) -> bool;

    /// Whether this codec can encode `payload`.
    fn can_encode(&self, payload: &Payload) -> bool;

    fn encode(&self, payload: &Payload, charset: &str) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, CodecError>;
}

/// Structured view of a payload, if it has one.
pub(crate) fn payload_to_json(payload: &Payload) -> Option<serde_json::Value> {
    match payload {
        Payload::Empty => Some(serde_json::Value::Null),
        Payload::Text(text) => Some(serde_json::Value::String(text.clone())),
        Payload::Json(value) => Some(value.clone()),
        Payload::List(items) => items
            .iter()
            .map(payload_to_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
        Payload::Bytes(_) | Payload::Writable(_) | Payload::Object { .. } => None,
    }
}
