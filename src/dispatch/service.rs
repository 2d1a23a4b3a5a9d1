//! `tower::Service` adapter over the dispatch engine.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::Service;

use crate::dispatch::DispatchEngine;
use crate::http::{Request, Response};

/// Lets a container that already parsed the request drive the engine
/// through a tower stack.
#[derive(Debug, Clone)]
pub struct DispatchService {
    engine: Arc<DispatchEngine>,
}

impl DispatchService {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }
}

impl Service<Request> for DispatchService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move { Ok(engine.handle(request).await) })
    }
}
