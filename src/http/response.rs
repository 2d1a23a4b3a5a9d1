//! Structured response model.
//!
//! # Responsibilities
//! - Status, optional custom reason phrase, mutable headers
//! - A body that is a value awaiting encoding until the engine encodes it
//!
//! # Design Decisions
//! - A response may be rewritten any number of times before encoding
//! - `Payload::Bytes` (or `Empty`) marks the encoded form written to the wire

use bytes::Bytes;
use http::StatusCode;

use crate::http::cookies::Cookie;
use crate::http::headers::{Headers, SET_COOKIE};
use crate::http::media::MediaType;
use crate::http::payload::Payload;

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: Headers,
    body: Payload,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: Payload::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.reason = None;
    }

    /// Reason phrase: the custom one if set, else the canonical one.
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("Unknown")
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Payload {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Payload>) {
        self.body = body.into();
    }

    pub fn take_body(&mut self) -> Payload {
        std::mem::take(&mut self.body)
    }

    pub fn content_type(&self) -> Option<MediaType> {
        self.headers.content_type()
    }

    pub fn set_content_type(&mut self, media_type: &MediaType) {
        self.headers.set_content_type(media_type);
    }

    pub fn add_cookie(&mut self, cookie: &Cookie) {
        self.headers.add(SET_COOKIE, cookie.to_string());
    }

    /// Encoded bytes, or `None` while the body still awaits encoding.
    pub fn encoded_body(&self) -> Option<Bytes> {
        match &self.body {
            Payload::Empty => Some(Bytes::new()),
            Payload::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    // Builder-style helpers for handlers.

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.set_status(status);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Payload>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.add_cookie(&cookie);
        self
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ok() {
        let response = Response::default();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.reason(), "OK");
        assert_eq!(response.encoded_body(), Some(Bytes::new()));
    }

    #[test]
    fn custom_reason_resets_with_status() {
        let mut response = Response::new(StatusCode::CREATED);
        response.set_reason("Made It");
        assert_eq!(response.reason(), "Made It");
        response.set_status(StatusCode::ACCEPTED);
        assert_eq!(response.reason(), "Accepted");
    }

    #[test]
    fn cookie_becomes_set_cookie_header() {
        let response = Response::ok().with_cookie(Cookie::new("a", "1").path("/"));
        assert_eq!(response.headers().get("set-cookie"), Some("a=1; Path=/"));
    }

    #[test]
    fn unencoded_body_has_no_bytes() {
        let response = Response::ok().with_body("text");
        assert!(response.encoded_body().is_none());
    }
}
