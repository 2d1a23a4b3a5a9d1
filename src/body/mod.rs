//! Body byte sources.
//!
//! # Data Flow
//! ```text
//! shared session input (pushback + socket/stdin)
//!     → LimitingStream (Content-Length window)
//!     → SharedStream (lets the serverless loop drain leftovers)
//!     → ByteBody (claim-once wrapper handed to the request)
//!         → to_stream() | buffer() | split() | release()
//! ```
//!
//! # Design Decisions
//! - Claiming is a runtime state transition on `&mut ByteBody`; the claimed
//!   stream itself is an owned value
//! - Bounded reads everywhere: a body without a known length must be
//!   buffered with an explicit limit

pub mod byte_body;
pub mod limiting;
pub mod shared;
pub mod split;

pub use byte_body::{BodyReader, ByteBody};
pub use limiting::LimitingStream;
pub use shared::SharedStream;
pub use split::SplitReader;

use thiserror::Error;

/// Errors raised while consuming a body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body was already read, buffered, split or released.
    #[error("body already claimed")]
    AlreadyClaimed,

    /// Buffering would exceed the caller's bound.
    #[error("body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("body read failed: {0}")]
    Io(#[from] std::io::Error),
}
