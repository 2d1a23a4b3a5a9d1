//! One request/response pairing and its identity.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::http::request::Request;
use crate::http::response::Response;

/// Relaxed ordering is enough: ids only need to be unique.
static EXCHANGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an exchange, used in log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub fn new() -> Self {
        Self(EXCHANGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ex-{}", self.0)
    }
}

/// Owns exactly one request and one response.
///
/// Created when dispatch starts; [`finish`](Self::finish) tears it down after
/// the response bytes were flushed.
#[derive(Debug)]
pub struct Exchange {
    id: ExchangeId,
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self {
            id: ExchangeId::new(),
            request,
            response: Response::ok(),
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }

    /// Release the request body if nobody claimed it and hand back the
    /// response.
    pub async fn finish(mut self) -> Response {
        if let Err(e) = self.request.body_mut().release().await {
            debug!(exchange_id = %self.id, error = %e, "request body release failed");
        }
        self.response
    }
}
