//! Per-exchange spans.
//!
//! # Responsibilities
//! - Resolve the request correlation id (`X-Request-Id` or a fresh UUID)
//! - Create the span every exchange log event is recorded in

use tracing::Span;
use uuid::Uuid;

use crate::http::headers::X_REQUEST_ID;
use crate::http::{ExchangeId, Request, RequestId};

/// Correlation id for `request`: the client's `X-Request-Id` when present
/// and non-empty, else a generated UUID v4.
pub fn request_id_for(request: &Request) -> RequestId {
    request
        .headers()
        .get(X_REQUEST_ID)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| RequestId(id.to_string()))
        .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()))
}

pub fn exchange_span(exchange_id: ExchangeId, request_id: &RequestId, request: &Request) -> Span {
    tracing::info_span!(
        "exchange",
        exchange_id = %exchange_id,
        request_id = %request_id,
        method = %request.method(),
        path = %request.path(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_request_id_is_reused() {
        let request = Request::get("/").header("x-request-id", "abc-123").build().unwrap();
        assert_eq!(request_id_for(&request), RequestId("abc-123".into()));
    }

    #[test]
    fn missing_request_id_is_generated() {
        let request = Request::get("/").build().unwrap();
        let id = request_id_for(&request);
        assert!(Uuid::parse_str(&id.0).is_ok());
    }
}
