//! HTTP exchange model.
//!
//! # Data Flow
//! ```text
//! raw bytes (framing) / http::Request (container)
//!     → request.rs (head, attributes, claim-once body)
//!     → exchange.rs (request + ambient response)
//!     → [dispatch engine fills the response]
//!     → response.rs (status, headers, payload → encoded bytes)
//!     → framing encoder / http::Response
//! ```
//!
//! # Design Decisions
//! - Own header, query and cookie containers instead of `http::HeaderMap`:
//!   canonical casing and per-name ordering are part of the wire contract
//! - Response bodies stay typed values (`Payload`) until encoding

pub mod convert;
pub mod cookies;
pub mod exchange;
pub mod headers;
pub mod media;
pub mod params;
pub mod payload;
pub mod request;
pub mod response;

pub use convert::ConvertError;
pub use cookies::{Cookie, Cookies};
pub use exchange::{Exchange, ExchangeId};
pub use headers::Headers;
pub use media::MediaType;
pub use params::QueryParams;
pub use payload::{Payload, Writable};
pub use request::{Attributes, Request, RequestBuilder, RequestHead, RequestId};
pub use response::Response;
