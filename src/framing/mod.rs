//! Raw framing subsystem: bytes ⇄ request/response with no network stack.
//!
//! # Data Flow
//! ```text
//! duplex byte stream (stdin/stdout or inherited socket)
//!     → input.rs (session input with pushback, shared)
//!     → decoder.rs (head → Request, Content-Length body window)
//!     → [dispatch engine answers the exchange]
//!     → encoder.rs (status line, headers, exact Content-Length, body)
//!     → flush, release body, drain window
//!     → serverless.rs loops until end-of-stream between exchanges
//! ```
//!
//! # Design Decisions
//! - Exactly one exchange occupies the stream at a time
//! - Protocol errors are answered per exchange; only I/O failures end the loop
//! - Responses are always fully buffered, never chunked

pub mod decoder;
pub mod encoder;
pub mod input;
pub mod serverless;

pub use decoder::{DecodedRequest, RequestDecoder};
pub use encoder::ResponseEncoder;
pub use input::{SessionInput, SharedInput};
pub use serverless::{LoopSummary, ServerlessApplication};

use thiserror::Error;

/// Errors raised while framing requests and responses.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("request header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("input ended inside a request header block")]
    Incomplete,

    #[error("malformed request line: {0:?}")]
    InvalidRequestLine(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    #[error("malformed header: {0}")]
    InvalidHeader(String),

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("conflicting Content-Length values")]
    ConflictingContentLength,

    #[error("response body of type {0} was not encoded")]
    UnencodedBody(&'static str),

    #[error("response head cannot be written: {0}")]
    InvalidResponseHead(String),

    #[error("stream I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FramingError::HeaderTooLarge { .. } => "header_too_large",
            FramingError::Incomplete => "incomplete",
            FramingError::InvalidRequestLine(_) => "request_line",
            FramingError::UnsupportedVersion(_) => "version",
            FramingError::InvalidMethod(_) => "method",
            FramingError::InvalidTarget(_) => "target",
            FramingError::InvalidHeader(_) => "header",
            FramingError::InvalidContentLength(_)
            | FramingError::ConflictingContentLength => "content_length",
            FramingError::UnencodedBody(_) => "unencoded_body",
            FramingError::InvalidResponseHead(_) => "response_head",
            FramingError::Io(_) => "io",
        }
    }
}
