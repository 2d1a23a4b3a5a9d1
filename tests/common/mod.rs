//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use serverless_dispatch::config::FramingConfig;
use serverless_dispatch::dispatch::{DispatchEngine, DispatchError, HttpFilter, Next, Outcome};
use serverless_dispatch::framing::{LoopSummary, ServerlessApplication};
use serverless_dispatch::http::{Request, Response};
use serverless_dispatch::routing::{Param, ParamType, Route, RouteTable};

/// Error raised by `/inventory`; an error route is registered for it.
#[derive(Debug, thiserror::Error)]
#[error("inventory unavailable")]
pub struct InventoryError;

/// Counts how often it runs.
pub struct CountingFilter {
    pub hits: Arc<AtomicUsize>,
    pub once: bool,
}

#[async_trait]
impl HttpFilter for CountingFilter {
    async fn filter(&self, request: &mut Request, next: Next<'_>) -> Result<Response, DispatchError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        next.run(request).await
    }

    fn once_per_request(&self) -> bool {
        self.once
    }
}

#[derive(Default, Clone)]
pub struct Counters {
    pub once_filter: Arc<AtomicUsize>,
    pub every_filter: Arc<AtomicUsize>,
    pub error_route: Arc<AtomicUsize>,
}

impl Counters {
    pub fn get(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Routes shared by the integration tests.
pub fn sample_routes(counters: &Counters) -> RouteTable {
    let mut routes = RouteTable::new();
    routes
        .add(
            Route::get("/hello/{name}", |inv| async move {
                let name: String = inv.args().get("name")?;
                Ok(format!("Hello {name}").into())
            })
            .param(Param::path("name")),
        )
        .unwrap()
        .add(
            Route::get("/pets/{id}", |inv| async move {
                let id: i64 = inv.args().get("id")?;
                Ok(json!({"id": id, "name": "Rex"}).into())
            })
            .param(Param::path("id").of(ParamType::Integer)),
        )
        .unwrap()
        .add(
            Route::post("/pets", |inv| async move {
                let pet: Value = inv.args().get("pet")?;
                Outcome::json(&pet)
            })
            .param(Param::body("pet"))
            .status(StatusCode::CREATED),
        )
        .unwrap()
        .add(
            Route::post("/peek", |mut inv| async move {
                let mut body = inv
                    .args_mut()
                    .take_stream("data")
                    .ok_or_else(|| DispatchError::bad_request("no body"))?;
                let mut reader = body.to_stream()?;
                let mut first = [0u8; 2];
                reader
                    .read_exact(&mut first)
                    .await
                    .map_err(DispatchError::handler)?;
                Ok(String::from_utf8_lossy(&first).into_owned().into())
            })
            .param(Param::body_stream("data")),
        )
        .unwrap()
        .add(
            Route::post("/echo", |inv| async move {
                Ok(inv.args().bytes("data").unwrap_or_default().into())
            })
            .param(Param::raw_body("data").optional()),
        )
        .unwrap()
        .add(Route::get("/inventory", |_| async {
            Err(DispatchError::handler(InventoryError))
        }))
        .unwrap();

    let hits = Arc::clone(&counters.error_route);
    routes
        .error_route::<InventoryError>(Route::handler(move |inv| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                inv.response().set_status(StatusCode::SERVICE_UNAVAILABLE);
                let cause = inv.error().map(ToString::to_string).unwrap_or_default();
                Ok(format!("handled: {cause}").into())
            }
        }))
        .filter(
            "/**",
            CountingFilter {
                hits: Arc::clone(&counters.once_filter),
                once: true,
            },
        )
        .filter(
            "/**",
            CountingFilter {
                hits: Arc::clone(&counters.every_filter),
                once: false,
            },
        );
    routes
}

pub fn engine(routes: RouteTable) -> Arc<DispatchEngine> {
    Arc::new(DispatchEngine::builder(routes).build())
}

pub fn app(routes: RouteTable) -> ServerlessApplication {
    ServerlessApplication::new(engine(routes), FramingConfig::default())
}

/// Run the serverless loop over `input` and collect everything written.
pub async fn serve(app: &ServerlessApplication, input: &[u8]) -> (LoopSummary, Vec<u8>) {
    let mut output = Vec::new();
    let summary = app
        .run(Cursor::new(input.to_vec()), &mut output)
        .await
        .expect("loop failed");
    (summary, output)
}

/// One response read back from the wire.
#[derive(Debug)]
pub struct WireResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("body is not JSON")
    }
}

/// Split serialized responses using their `Content-Length`.
pub fn parse_responses(mut bytes: &[u8]) -> Vec<WireResponse> {
    let mut responses = Vec::new();
    while !bytes.is_empty() {
        let head_end = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("unterminated response head");
        let head = std::str::from_utf8(&bytes[..head_end]).expect("head is not UTF-8");
        let mut lines = head.split("\r\n");
        let status_line = lines.next().expect("missing status line");
        let mut parts = status_line.splitn(3, ' ');
        assert_eq!(parts.next(), Some("HTTP/1.1"));
        let status = parts.next().and_then(|s| s.parse().ok()).expect("bad status");
        let reason = parts.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .expect("missing content-length");
        let body_start = head_end + 4;
        responses.push(WireResponse {
            status,
            reason,
            headers,
            body: bytes[body_start..body_start + length].to_vec(),
        });
        bytes = &bytes[body_start + length..];
    }
    responses
}
