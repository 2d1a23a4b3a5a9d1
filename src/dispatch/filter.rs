//! HTTP filter chain.
//!
//! A filter receives the request and a [`Next`] continuation. `Next` is
//! consumed by [`Next::run`], so a filter can invoke the rest of the chain at
//! most once; not calling it short-circuits the chain.

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::DispatchError;
use crate::http::{Request, Response};

#[async_trait]
pub trait HttpFilter: Send + Sync {
    async fn filter(&self, request: &mut Request, next: Next<'_>)
        -> Result<Response, DispatchError>;

    /// Filters that return true are skipped when an error route is
    /// dispatched for a request they already saw.
    fn once_per_request(&self) -> bool {
        false
    }
}

/// The last link of a chain.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn call(&self, request: &mut Request) -> Result<Response, DispatchError>;
}

/// Single-use continuation into the remaining chain.
pub struct Next<'a> {
    filters: &'a [Arc<dyn HttpFilter>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub fn new(filters: &'a [Arc<dyn HttpFilter>], terminal: &'a dyn Terminal) -> Self {
        Self { filters, terminal }
    }

    /// Number of filters still ahead.
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }

    pub async fn run(self, request: &mut Request) -> Result<Response, DispatchError> {
        match self.filters.split_first() {
            Some((filter, rest)) => {
                let next = Next {
                    filters: rest,
                    terminal: self.terminal,
                };
                filter.filter(request, next).await
            }
            None => self.terminal.call(request).await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.filters.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
    }

    #[async_trait]
    impl HttpFilter for Recorder {
        async fn filter(
            &self,
            request: &mut Request,
            next: Next<'_>,
        ) -> Result<Response, DispatchError> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            if self.short_circuit {
                return Ok(Response::new(StatusCode::UNAUTHORIZED));
            }
            let response = next.run(request).await?;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            Ok(response.with_header("x-filter", self.name))
        }
    }

    struct Route(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Terminal for Route {
        async fn call(&self, _request: &mut Request) -> Result<Response, DispatchError> {
            self.0.lock().unwrap().push("route".into());
            Ok(Response::ok())
        }
    }

    fn chain(log: &Arc<Mutex<Vec<String>>>, blocking: bool) -> Vec<Arc<dyn HttpFilter>> {
        vec![
            Arc::new(Recorder {
                name: "a",
                log: log.clone(),
                short_circuit: false,
            }),
            Arc::new(Recorder {
                name: "b",
                log: log.clone(),
                short_circuit: blocking,
            }),
        ]
    }

    #[tokio::test]
    async fn filters_wrap_the_terminal_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let filters = chain(&log, false);
        let terminal = Route(log.clone());
        let mut request = Request::get("/").build().unwrap();

        let response = Next::new(&filters, &terminal).run(&mut request).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["a:before", "b:before", "route", "b:after", "a:after"]
        );
        assert_eq!(response.headers().get_all("x-filter"), ["b", "a"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let filters = chain(&log, true);
        let terminal = Route(log.clone());
        let mut request = Request::get("/").build().unwrap();

        let response = Next::new(&filters, &terminal).run(&mut request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // The route never runs; the outer filter still sees the early response.
        assert_eq!(*log.lock().unwrap(), ["a:before", "b:before", "a:after"]);
        assert_eq!(response.headers().get_all("x-filter"), ["a"]);
    }
}
