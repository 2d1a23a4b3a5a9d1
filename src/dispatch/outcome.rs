//! Handler results and the context handlers are invoked with.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Stream, StreamExt};
use http::StatusCode;
use serde::Serialize;

use crate::bind::Arguments;
use crate::dispatch::DispatchError;
use crate::http::{Attributes, Cookie, Payload, RequestHead, Response};

/// What a handler produced, decided once per invocation.
pub enum Outcome {
    /// Keep the ambient response as the handler left it.
    Empty,
    /// A body value for the ambient response.
    Immediate(Payload),
    /// Resolve, then interpret the inner outcome the same way.
    Deferred(BoxFuture<'static, Result<Outcome, DispatchError>>),
    /// Collected into a list, or cut to its first element on single routes.
    Sequence(BoxStream<'static, Result<Payload, DispatchError>>),
    /// Replaces the ambient response.
    Response(Response),
}

impl Outcome {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        Outcome::Deferred(future.boxed())
    }

    pub fn sequence<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Payload, DispatchError>> + Send + 'static,
    {
        Outcome::Sequence(stream.boxed())
    }

    /// Serialize `value` into a structured body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        Payload::json(value)
            .map(Outcome::Immediate)
            .map_err(DispatchError::handler)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Outcome::Immediate(Payload::Text(text.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Empty => "empty",
            Outcome::Immediate(_) => "immediate",
            Outcome::Deferred(_) => "deferred",
            Outcome::Sequence(_) => "sequence",
            Outcome::Response(_) => "response",
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Immediate(payload) => f.debug_tuple("Immediate").field(payload).finish(),
            Outcome::Response(response) => f.debug_tuple("Response").field(response).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

impl From<&str> for Outcome {
    fn from(text: &str) -> Self {
        Outcome::text(text)
    }
}

impl From<String> for Outcome {
    fn from(text: String) -> Self {
        Outcome::text(text)
    }
}

impl From<Bytes> for Outcome {
    fn from(bytes: Bytes) -> Self {
        Outcome::Immediate(Payload::Bytes(bytes))
    }
}

impl From<serde_json::Value> for Outcome {
    fn from(value: serde_json::Value) -> Self {
        Outcome::Immediate(Payload::Json(value))
    }
}

impl From<Payload> for Outcome {
    fn from(payload: Payload) -> Self {
        Outcome::Immediate(payload)
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Response(response)
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Empty
    }
}

/// Shared handle on the response a handler is contributing to.
#[derive(Debug, Clone)]
pub struct ResponseHandle {
    inner: Arc<Mutex<Response>>,
}

impl ResponseHandle {
    pub(crate) fn new(response: Response) -> Self {
        Self {
            inner: Arc::new(Mutex::new(response)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Response> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status()
    }

    pub fn set_status(&self, status: StatusCode) {
        self.lock().set_status(status);
    }

    pub fn set_header(&self, name: &str, value: impl Into<String>) {
        self.lock().headers_mut().set(name, value);
    }

    pub fn add_header(&self, name: &str, value: impl Into<String>) {
        self.lock().headers_mut().add(name, value);
    }

    pub fn add_cookie(&self, cookie: &Cookie) {
        self.lock().add_cookie(cookie);
    }

    /// Run `f` with exclusive access to the response.
    pub fn with<T>(&self, f: impl FnOnce(&mut Response) -> T) -> T {
        f(&mut *self.lock())
    }

    /// Take the response back once the handler is done with it.
    pub(crate) fn into_response(self) -> Response {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            // A clone escaped the handler; take what it left behind.
            Err(shared) => {
                let mut guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                std::mem::take(&mut *guard)
            }
        }
    }
}

/// Everything a handler is invoked with.
///
/// The attribute bag is the request's live one, so values set by filters
/// are visible here and values set here are visible to later links.
pub struct Invocation {
    args: Arguments,
    head: Arc<RequestHead>,
    attributes: Attributes,
    response: ResponseHandle,
    error: Option<Arc<DispatchError>>,
}

impl Invocation {
    pub(crate) fn new(
        args: Arguments,
        head: Arc<RequestHead>,
        attributes: Attributes,
        response: ResponseHandle,
        error: Option<Arc<DispatchError>>,
    ) -> Self {
        Self {
            args,
            head,
            attributes,
            response,
            error,
        }
    }

    pub fn args(&self) -> &Arguments {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Arguments {
        &mut self.args
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    /// The failure being handled, when invoked as an error route.
    pub fn error(&self) -> Option<&DispatchError> {
        self.error.as_deref()
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("method", self.head.method())
            .field("path", &self.head.path())
            .field("args", &self.args)
            .field("error", &self.error)
            .finish()
    }
}
