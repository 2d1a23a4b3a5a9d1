//! Argument binding subsystem.
//!
//! # Data Flow
//! ```text
//! RouteMatch (template variables bound as text)
//!     → ArgumentSatisfier::fulfill (query, headers, cookies, body)
//!     → RouteMatch with more arguments bound, or BindingError
//!     → Arguments handed to the handler inside its Invocation
//! ```
//!
//! # Design Decisions
//! - The engine only sees the `ArgumentSatisfier` trait;
//!   `RequestArgumentBinder` is the stock implementation
//! - A body is decoded at most once per request; the decoded value is kept
//!   on the request for later fields and for opportunistic binding

pub mod arguments;
pub mod binder;

pub use arguments::{ArgValue, Arguments};
pub use binder::RequestArgumentBinder;

use async_trait::async_trait;
use http::StatusCode;
use thiserror::Error;

use crate::body::BodyError;
use crate::http::Request;
use crate::routing::RouteMatch;

/// Binds handler parameters for a matched route.
#[async_trait]
pub trait ArgumentSatisfier: Send + Sync {
    async fn fulfill(
        &self,
        route_match: RouteMatch,
        request: &mut Request,
    ) -> Result<RouteMatch, BindingError>;
}

/// Errors raised while binding arguments.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Required argument [{name}] not specified")]
    Missing { name: String },

    #[error("Failed to convert argument [{name}]: {reason}")]
    Conversion { name: String, reason: String },

    #[error("Content type [{media_type}] not supported")]
    UnsupportedMediaType { media_type: String },

    #[error("Request body could not be read: {0}")]
    Body(#[from] BodyError),
}

impl BindingError {
    /// Status of the generic response for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            BindingError::Missing { .. } | BindingError::Conversion { .. } => {
                StatusCode::BAD_REQUEST
            }
            BindingError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindingError::Body(BodyError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            BindingError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}
