//! The dispatch engine.
//!
//! # Responsibilities
//! - Resolve the route for a request and bind its arguments
//! - Invoke the handler and flatten deferred and streamed outcomes
//! - Run the filter chain around route execution
//! - Turn every failure into a response, through error routes when declared
//! - Encode the final response body exactly once
//!
//! # Data Flow
//! ```text
//! service(exchange)
//!     → run(Pass::Route): filters → RouteTerminal (lookup, bind, invoke)
//!         Ok(status >= 400) → status route? → run(Pass::Error)
//!         Err(error)        → error route? → run(Pass::Error)
//!                             else exception handler or generic body
//!     → encode body (text, bytes, writable, codec)
//!     → exchange.response
//! ```
//!
//! # Design Decisions
//! - An error pass never starts another error pass; a failure inside it
//!   answers 500 with the original message
//! - Equally specific routes are a hard error, never a coin toss
//! - Filters see the response before encoding

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use http::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info, Instrument};

use crate::bind::binder::{convert, decoded_body, field_value};
use crate::bind::{ArgumentSatisfier, BindingError, RequestArgumentBinder};
use crate::codec::{CodecError, CodecRegistry};
use crate::config::DispatchConfig;
use crate::dispatch::errors::{ErrorBody, MatchedRoute, ThrownError};
use crate::dispatch::exception::ExceptionHandlers;
use crate::dispatch::filter::{Next, Terminal};
use crate::dispatch::outcome::{Invocation, Outcome, ResponseHandle};
use crate::dispatch::DispatchError;
use crate::http::headers::{ALLOW, X_REQUEST_ID};
use crate::http::{Exchange, MediaType, Payload, Request, Response};
use crate::observability::metrics;
use crate::observability::spans::{exchange_span, request_id_for};
use crate::routing::{Route, RouteLookup, RouteMatch, Router};

/// Which kind of dispatch a chain run performs.
enum Pass {
    Route,
    /// Re-dispatch into an error route. `error` is absent when the route was
    /// chosen for a plain error status.
    Error {
        route: Arc<Route>,
        status: StatusCode,
        error: Option<Arc<DispatchError>>,
    },
}

impl Pass {
    fn is_error(&self) -> bool {
        matches!(self, Pass::Error { .. })
    }
}

/// What a handler outcome resolved to.
enum Resolved {
    Ambient,
    Body(Payload),
    Replace(Response),
}

pub struct DispatchEngine {
    router: Arc<dyn Router>,
    satisfier: Arc<dyn ArgumentSatisfier>,
    codecs: Arc<CodecRegistry>,
    exception_handlers: ExceptionHandlers,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn builder(router: impl Router + 'static) -> DispatchEngineBuilder {
        DispatchEngineBuilder {
            router: Arc::new(router),
            satisfier: None,
            codecs: CodecRegistry::with_defaults(),
            exception_handlers: ExceptionHandlers::new(),
            config: DispatchConfig::default(),
        }
    }

    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Answer one exchange: populate `exchange.response` with an encoded
    /// response. Never fails; every error becomes a response.
    pub async fn service(&self, exchange: &mut Exchange) {
        let start = Instant::now();
        let request_id = request_id_for(&exchange.request);
        exchange.request.attributes().insert(request_id.clone());
        let span = exchange_span(exchange.id(), &request_id, &exchange.request);

        async {
            let mut response = self.run(&mut exchange.request, Pass::Route).await;
            self.encode(&mut response);
            if !response.headers().contains(X_REQUEST_ID) {
                response.headers_mut().set(X_REQUEST_ID, request_id.0.clone());
            }

            let matched = exchange.request.attributes().get::<MatchedRoute>();
            let route = matched.as_ref().and_then(MatchedRoute::template).unwrap_or("none");
            metrics::record_request(
                exchange.request.method().as_str(),
                response.status().as_u16(),
                route,
                start,
            );
            info!(
                status = response.status().as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "request completed"
            );
            exchange.response = response;
        }
        .instrument(span)
        .await
    }

    /// Dispatch a request outside the serverless loop, releasing its body
    /// afterwards.
    pub async fn handle(&self, request: Request) -> Response {
        let mut exchange = Exchange::new(request);
        self.service(&mut exchange).await;
        exchange.finish().await
    }

    fn run<'a>(&'a self, request: &'a mut Request, pass: Pass) -> BoxFuture<'a, Response> {
        async move {
            let filters: Vec<_> = self
                .router
                .filters_for(request.method(), request.path())
                .into_iter()
                .filter(|filter| !(pass.is_error() && filter.once_per_request()))
                .collect();

            let result = {
                let terminal = RouteTerminal {
                    engine: self,
                    pass: &pass,
                };
                Next::new(&filters, &terminal).run(request).await
            };

            match result {
                Ok(response) => self.check_status(request, pass, response).await,
                Err(error) => self.handle_error(request, pass, error).await,
            }
        }
        .boxed()
    }

    /// Route lookup for a normal pass.
    fn resolve(&self, request: &Request) -> Result<RouteMatch, DispatchError> {
        match self.router.find(request.method(), request.path()) {
            RouteLookup::NotFound => Err(DispatchError::NotFound),
            RouteLookup::MethodNotAllowed(allowed) => Err(DispatchError::MethodNotAllowed {
                method: request.method().clone(),
                path: request.path().to_string(),
                allowed,
            }),
            RouteLookup::Matches(mut matches) => {
                if matches.len() > 1 {
                    return Err(DispatchError::DuplicateRoute {
                        path: request.path().to_string(),
                        routes: matches.iter().map(|m| m.route().describe()).collect(),
                    });
                }
                let route_match = matches.pop().ok_or(DispatchError::NotFound)?;
                request
                    .attributes()
                    .insert(MatchedRoute(Arc::clone(route_match.route())));
                debug!(route = %route_match.route().describe(), "route matched");
                Ok(route_match)
            }
        }
    }

    /// Bind, invoke and interpret one route.
    async fn invoke(
        &self,
        route_match: RouteMatch,
        request: &mut Request,
        error: Option<Arc<DispatchError>>,
        ambient: Response,
    ) -> Result<Response, DispatchError> {
        let route_match = self.satisfier.fulfill(route_match, request).await?;
        let route_match = self.fulfill_from_body(route_match, request).await;
        if let Some(param) = route_match.missing().next() {
            return Err(BindingError::Missing {
                name: param.name.clone(),
            }
            .into());
        }

        let (route, args) = route_match.into_parts();
        let handle = ResponseHandle::new(ambient);
        let invocation = Invocation::new(
            args,
            Arc::clone(request.head()),
            request.attributes().clone(),
            handle.clone(),
            error,
        );

        let outcome = route.invoke(invocation).await?;
        let mut response = match self.interpret(&route, outcome).await? {
            Resolved::Ambient => handle.into_response(),
            Resolved::Body(payload) => {
                let mut response = handle.into_response();
                response.set_body(payload);
                response
            }
            Resolved::Replace(response) => response,
        };
        apply_route_metadata(&route, &mut response);
        Ok(response)
    }

    async fn interpret(&self, route: &Route, mut outcome: Outcome) -> Result<Resolved, DispatchError> {
        loop {
            outcome = match outcome {
                Outcome::Empty => return Ok(Resolved::Ambient),
                Outcome::Immediate(payload) => return Ok(Resolved::Body(payload)),
                Outcome::Response(response) => return Ok(Resolved::Replace(response)),
                Outcome::Deferred(future) => future.await?,
                Outcome::Sequence(mut stream) if route.is_single() => {
                    return match stream.next().await {
                        Some(item) => item.map(Resolved::Body),
                        None => Err(DispatchError::NotFound),
                    };
                }
                Outcome::Sequence(stream) => {
                    let items: Vec<Payload> = stream.try_collect().await?;
                    return Ok(Resolved::Body(Payload::List(items)));
                }
            };
        }
    }

    /// Fill still-missing arguments by name from a form or JSON object body.
    async fn fulfill_from_body(&self, mut route_match: RouteMatch, request: &mut Request) -> RouteMatch {
        if route_match.is_fulfilled()
            || route_match.route().claims_body()
            || !request.head().permits_body()
        {
            return route_match;
        }
        let structured = request
            .head()
            .content_type()
            .is_some_and(|media| media.is_form() || media.is_json());
        if !structured && request.parsed_body().is_none() {
            return route_match;
        }

        let fields = match decoded_body(&self.codecs, self.config.max_buffered_body, request).await {
            Ok(Some(Value::Object(fields))) => fields,
            Ok(_) => return route_match,
            Err(error) => {
                debug!(error = %error, "body not usable for argument binding");
                return route_match;
            }
        };

        let route = Arc::clone(route_match.route());
        for param in route.params() {
            if !param.required || route_match.arguments().contains(&param.name) {
                continue;
            }
            let Some(value) = fields.get(&param.name) else {
                continue;
            };
            if let Ok(value) = convert(param, field_value(value.clone())) {
                route_match.arguments_mut().insert(param.name.clone(), value);
            }
        }
        route_match
    }

    /// Re-dispatch into a status route when a normal pass produced an error
    /// status.
    async fn check_status(&self, request: &mut Request, pass: Pass, response: Response) -> Response {
        if pass.is_error() || response.status().as_u16() < 400 {
            return response;
        }
        let status = response.status();
        let origin = request.attributes().get::<MatchedRoute>();
        let Some(route_match) = self
            .router
            .find_status_route(origin.as_ref().map(|m| &*m.0), status)
        else {
            return response;
        };

        debug!(status = status.as_u16(), "dispatching status route");
        let pass = Pass::Error {
            route: Arc::clone(route_match.route()),
            status,
            error: None,
        };
        self.run(request, pass).await
    }

    async fn handle_error(&self, request: &mut Request, pass: Pass, error: DispatchError) -> Response {
        if let Pass::Error { error: original, .. } = &pass {
            error!(error = %error, "error route failed");
            let message = original
                .as_ref()
                .map_or_else(|| error.to_string(), |original| original.to_string());
            return generic_error(StatusCode::INTERNAL_SERVER_ERROR, message);
        }

        let origin = request.attributes().get::<MatchedRoute>();
        let origin = origin.as_ref().map(|m| &*m.0);
        let status = error.status_code();
        let route_match = self.router.find_error_route(origin, error.as_error()).or_else(|| {
            match &error {
                DispatchError::NotFound
                | DispatchError::MethodNotAllowed { .. }
                | DispatchError::Binding(_)
                | DispatchError::Status { .. } => self.router.find_status_route(origin, status),
                _ => None,
            }
        });

        let Some(route_match) = route_match else {
            return self.default_error_response(request, error);
        };

        debug!(route = %route_match.route().describe(), error = %error, "dispatching error route");
        let allow = allow_header(&error);
        let error = Arc::new(error);
        request.attributes().insert(ThrownError(Arc::clone(&error)));
        let pass = Pass::Error {
            route: Arc::clone(route_match.route()),
            status,
            error: Some(error),
        };
        let mut response = self.run(request, pass).await;
        if let Some(allow) = allow {
            if !response.headers().contains(ALLOW) {
                response.headers_mut().set(ALLOW, allow);
            }
        }
        response
    }

    /// Response for an error no error route claimed.
    fn default_error_response(&self, request: &Request, error: DispatchError) -> Response {
        let status = error.status_code();
        match error {
            DispatchError::Status {
                status,
                message,
                body,
            } => {
                debug!(status = status.as_u16(), "explicit status outcome");
                let mut response = Response::new(status);
                match body {
                    Some(body) => response.set_body(body),
                    None if status.as_u16() >= 400 => {
                        response.set_body(ErrorBody::new(message).to_payload())
                    }
                    None => {}
                }
                response
            }
            DispatchError::NotFound | DispatchError::MethodNotAllowed { .. } | DispatchError::Binding(_) => {
                debug!(status = status.as_u16(), error = %error, "request rejected");
                let mut response = generic_error(status, error.to_string());
                if let Some(allow) = allow_header(&error) {
                    response.headers_mut().set(ALLOW, allow);
                }
                response
            }
            other => {
                if let Some(response) = self.exception_handlers.handle(other.as_error(), request.head()) {
                    debug!(error = %other, "error handled by exception handler");
                    return response;
                }
                error!(error = %other, "unexpected error dispatching request");
                generic_error(status, other.to_string())
            }
        }
    }

    /// Encode the body in place. An encoding failure replaces the response
    /// with a 500.
    fn encode(&self, response: &mut Response) {
        if let Err(e) = self.try_encode(response) {
            error!(error = %e, "response encoding failed");
            let body = serde_json::to_vec(&ErrorBody::new(e.to_string())).unwrap_or_default();
            let mut failed = Response::new(StatusCode::INTERNAL_SERVER_ERROR);
            failed.set_content_type(&MediaType::json());
            failed.set_body(Bytes::from(body));
            *response = failed;
        }
    }

    fn try_encode(&self, response: &mut Response) -> Result<(), CodecError> {
        let charset = response
            .content_type()
            .and_then(|media| media.charset().map(str::to_string))
            .unwrap_or_else(|| self.config.default_charset.clone());

        let bytes = match response.take_body() {
            Payload::Empty => return Ok(()),
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => {
                if response.content_type().is_none() {
                    response.set_content_type(&MediaType::text_plain());
                }
                Bytes::from(text)
            }
            Payload::Writable(writable) => {
                let mut out = Vec::new();
                writable
                    .write_to(&mut out, &charset)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
                Bytes::from(out)
            }
            payload => {
                let media_type = response.content_type().unwrap_or_else(MediaType::json);
                let codec = self
                    .codecs
                    .find_encoder(&media_type, &payload)
                    .ok_or_else(|| CodecError::NoEncoder {
                        media_type: media_type.to_string(),
                        type_name: payload.type_name(),
                    })?;
                let bytes = codec.encode(&payload, &charset)?;
                if response.content_type().is_none() {
                    response.set_content_type(&media_type);
                }
                bytes
            }
        };
        response.set_body(bytes);
        Ok(())
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("codecs", &self.codecs)
            .field("exception_handlers", &self.exception_handlers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Route execution as the last link of the filter chain.
struct RouteTerminal<'a> {
    engine: &'a DispatchEngine,
    pass: &'a Pass,
}

#[async_trait]
impl<'a> Terminal for RouteTerminal<'a> {
    async fn call(&self, request: &mut Request) -> Result<Response, DispatchError> {
        match self.pass {
            Pass::Route => {
                let route_match = self.engine.resolve(request)?;
                self.engine
                    .invoke(route_match, request, None, Response::ok())
                    .await
            }
            Pass::Error {
                route,
                status,
                error,
            } => {
                let route_match = RouteMatch::new(Arc::clone(route));
                self.engine
                    .invoke(route_match, request, error.clone(), Response::new(*status))
                    .await
            }
        }
    }
}

pub struct DispatchEngineBuilder {
    router: Arc<dyn Router>,
    satisfier: Option<Arc<dyn ArgumentSatisfier>>,
    codecs: CodecRegistry,
    exception_handlers: ExceptionHandlers,
    config: DispatchConfig,
}

impl DispatchEngineBuilder {
    /// Replace the default [`RequestArgumentBinder`].
    pub fn satisfier(mut self, satisfier: impl ArgumentSatisfier + 'static) -> Self {
        self.satisfier = Some(Arc::new(satisfier));
        self
    }

    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn exception_handlers(mut self, handlers: ExceptionHandlers) -> Self {
        self.exception_handlers = handlers;
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> DispatchEngine {
        let codecs = Arc::new(self.codecs);
        let max_body = self.config.max_buffered_body;
        let satisfier = self.satisfier.unwrap_or_else(|| {
            Arc::new(RequestArgumentBinder::new(Arc::clone(&codecs), max_body))
        });
        DispatchEngine {
            router: self.router,
            satisfier,
            codecs,
            exception_handlers: self.exception_handlers,
            config: self.config,
        }
    }
}

fn apply_route_metadata(route: &Route, response: &mut Response) {
    if let Some(status) = route.status() {
        if response.status() == StatusCode::OK {
            response.set_status(status);
        }
    }
    if let Some(media_type) = route.produces() {
        if response.content_type().is_none() && !response.body().is_empty() {
            response.set_content_type(media_type);
        }
    }
    for (name, value) in route.headers() {
        if !response.headers().contains(name) {
            response.headers_mut().set(name, value.clone());
        }
    }
}

fn generic_error(status: StatusCode, message: String) -> Response {
    let mut response = Response::new(status);
    response.set_content_type(&MediaType::json());
    response.set_body(ErrorBody::new(message).to_payload());
    response
}

fn allow_header(error: &DispatchError) -> Option<String> {
    match error {
        DispatchError::MethodNotAllowed { allowed, .. } => Some(
            allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    }
}
