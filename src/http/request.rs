//! Structured request model.
//!
//! # Responsibilities
//! - Hold the immutable identity of a request (method, target, headers,
//!   query, cookies) behind a shared head
//! - Carry the request-scoped attribute context threaded through filters,
//!   handlers and error routes
//! - Own the claim-once body
//!
//! # Design Decisions
//! - The head is an `Arc` so handlers can keep it past an await without
//!   borrowing the request
//! - Attributes are a shared live handle (not a copy): work resumed after a
//!   suspension sees every attribute set before it

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::{Extensions, Method, Uri};

use crate::body::ByteBody;
use crate::http::cookies::Cookies;
use crate::http::headers::{Headers, COOKIE};
use crate::http::media::MediaType;
use crate::http::params::QueryParams;

/// Correlation id for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity fields of a request.
#[derive(Debug)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    headers: Headers,
    query: QueryParams,
    cookies: Cookies,
}

impl RequestHead {
    pub fn new(method: Method, uri: Uri, headers: Headers) -> Self {
        let query = uri.query().map(QueryParams::parse).unwrap_or_default();
        let cookies = Cookies::parse(headers.get_all(COOKIE).iter().map(String::as_str));
        Self {
            method,
            uri,
            headers,
            query,
            cookies,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn content_type(&self) -> Option<MediaType> {
        self.headers.content_type()
    }

    /// Methods whose requests may carry a body.
    pub fn permits_body(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE | Method::OPTIONS
        )
    }
}

/// Request-scoped typed attribute bag.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    inner: Arc<Mutex<Extensions>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&self, value: T) -> Option<T> {
        self.lock().insert(value)
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.lock().get::<T>().cloned()
    }

    pub fn remove<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.lock().remove::<T>()
    }

    pub fn contains<T: Clone + Send + Sync + 'static>(&self) -> bool {
        self.lock().get::<T>().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Extensions> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One HTTP request: shared head, live attributes, claim-once body.
#[derive(Debug)]
pub struct Request {
    head: Arc<RequestHead>,
    attributes: Attributes,
    body: ByteBody,
    parsed_body: Option<serde_json::Value>,
}

impl Request {
    pub fn new(method: Method, uri: Uri, headers: Headers, body: ByteBody) -> Self {
        Self::from_head(RequestHead::new(method, uri, headers), body)
    }

    pub fn from_head(head: RequestHead, body: ByteBody) -> Self {
        Self {
            head: Arc::new(head),
            attributes: Attributes::new(),
            body,
            parsed_body: None,
        }
    }

    pub fn builder(method: Method, uri: &str) -> RequestBuilder {
        RequestBuilder {
            method,
            uri: uri.to_string(),
            headers: Headers::new(),
            body: ByteBody::empty(),
        }
    }

    pub fn get(uri: &str) -> RequestBuilder {
        Self::builder(Method::GET, uri)
    }

    pub fn post(uri: &str) -> RequestBuilder {
        Self::builder(Method::POST, uri)
    }

    pub fn head(&self) -> &Arc<RequestHead> {
        &self.head
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    pub fn path(&self) -> &str {
        self.head.path()
    }

    pub fn headers(&self) -> &Headers {
        self.head.headers()
    }

    pub fn query(&self) -> &QueryParams {
        self.head.query()
    }

    pub fn cookies(&self) -> &Cookies {
        self.head.cookies()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn body(&self) -> &ByteBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ByteBody {
        &mut self.body
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.attributes.get::<RequestId>()
    }

    /// Structured body decoded earlier in this exchange, if any.
    pub fn parsed_body(&self) -> Option<&serde_json::Value> {
        self.parsed_body.as_ref()
    }

    pub fn set_parsed_body(&mut self, value: serde_json::Value) {
        self.parsed_body = Some(value);
    }
}

/// Builder for requests handed to the engine outside the framing layer.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Headers,
    body: ByteBody,
}

impl RequestBuilder {
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = ByteBody::from_bytes(body);
        self
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("Content-Type", MediaType::APPLICATION_JSON)
            .body(value.to_string())
    }

    pub fn build(self) -> Result<Request, http::uri::InvalidUri> {
        let uri: Uri = self.uri.parse()?;
        Ok(Request::new(self.method, uri, self.headers, self.body))
    }
}
