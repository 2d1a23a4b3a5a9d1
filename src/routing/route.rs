//! Route definitions and resolved matches.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::{Method, StatusCode};

use crate::bind::{ArgValue, Arguments};
use crate::dispatch::{DispatchError, Invocation, Outcome};
use crate::http::MediaType;
use crate::routing::matcher::{TemplateError, UriTemplate};

/// Type-erased async handler.
pub type Handler =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, Result<Outcome, DispatchError>> + Send + Sync>;

/// Where a handler parameter is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Cookie,
    /// Whole body, decoded by content type.
    Body,
    /// Whole body as raw bytes.
    RawBody,
    /// Whole body as an unread stream.
    BodyStream,
    /// One named field of a decoded form or JSON object body.
    BodyField,
}

impl ParamSource {
    /// Sources that consume the entire request body.
    pub fn claims_body(self) -> bool {
        matches!(self, ParamSource::Body | ParamSource::RawBody | ParamSource::BodyStream)
    }
}

/// Target type of a text-valued parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    /// Any JSON value.
    Json,
}

/// One declared handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub source: ParamSource,
    pub ty: ParamType,
    pub required: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            source,
            ty: ParamType::String,
            required: true,
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Path)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Query)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Header)
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Cookie)
    }

    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Body).of(ParamType::Json)
    }

    pub fn raw_body(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::RawBody)
    }

    pub fn body_stream(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::BodyStream)
    }

    pub fn body_field(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::BodyField)
    }

    pub fn of(mut self, ty: ParamType) -> Self {
        self.ty = ty;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A registered handler with its binding and response metadata.
pub struct Route {
    method: Option<Method>,
    template: Option<UriTemplate>,
    handler: Handler,
    params: Vec<Param>,
    produces: Option<MediaType>,
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    group: Option<String>,
    single: bool,
}

impl Route {
    /// A route answering `method` on paths matching `template`.
    pub fn try_new<F, Fut>(method: Method, template: &str, handler: F) -> Result<Self, TemplateError>
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        let template = UriTemplate::parse(template)?;
        let mut route = Self::handler(handler);
        route.method = Some(method);
        route.template = Some(template);
        Ok(route)
    }

    /// A route that is only reachable as an error route.
    pub fn handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        Self {
            method: None,
            template: None,
            handler: Arc::new(move |invocation| handler(invocation).boxed()),
            params: Vec::new(),
            produces: None,
            status: None,
            headers: Vec::new(),
            group: None,
            single: false,
        }
    }

    pub fn get<F, Fut>(template: &str, handler: F) -> RouteBuilder
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        RouteBuilder::new(Method::GET, template, handler)
    }

    pub fn post<F, Fut>(template: &str, handler: F) -> RouteBuilder
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        RouteBuilder::new(Method::POST, template, handler)
    }

    pub fn put<F, Fut>(template: &str, handler: F) -> RouteBuilder
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        RouteBuilder::new(Method::PUT, template, handler)
    }

    pub fn patch<F, Fut>(template: &str, handler: F) -> RouteBuilder
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        RouteBuilder::new(Method::PATCH, template, handler)
    }

    pub fn delete<F, Fut>(template: &str, handler: F) -> RouteBuilder
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        RouteBuilder::new(Method::DELETE, template, handler)
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn template(&self) -> Option<&UriTemplate> {
        self.template.as_ref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn produces(&self) -> Option<&MediaType> {
        self.produces.as_ref()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Whether a sequence result collapses to its first element.
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Whether some parameter consumes the whole body.
    pub fn claims_body(&self) -> bool {
        self.params.iter().any(|p| p.source.claims_body())
    }

    pub fn invoke(&self, invocation: Invocation) -> BoxFuture<'static, Result<Outcome, DispatchError>> {
        (self.handler)(invocation)
    }

    // Metadata setters shared with `RouteBuilder` for error routes.

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_produces(mut self, media_type: MediaType) -> Self {
        self.produces = Some(media_type);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// `GET /pets/{id}`, or `<error route>` for error-only routes.
    pub fn describe(&self) -> String {
        match (&self.method, &self.template) {
            (Some(method), Some(template)) => format!("{method} {template}"),
            _ => "<error route>".to_string(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("route", &self.describe())
            .field("params", &self.params)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Deferred route construction; template errors surface on registration.
pub struct RouteBuilder {
    route: Result<Route, TemplateError>,
}

impl RouteBuilder {
    fn new<F, Fut>(method: Method, template: &str, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, DispatchError>> + Send + 'static,
    {
        Self {
            route: Route::try_new(method, template, handler),
        }
    }

    fn map(self, f: impl FnOnce(Route) -> Route) -> Self {
        Self {
            route: self.route.map(f),
        }
    }

    pub fn param(self, param: Param) -> Self {
        self.map(|r| r.with_param(param))
    }

    pub fn produces(self, media_type: MediaType) -> Self {
        self.map(|r| r.with_produces(media_type))
    }

    pub fn status(self, status: StatusCode) -> Self {
        self.map(|r| r.with_status(status))
    }

    pub fn header(self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.map(|r| r.with_header(name, value))
    }

    pub fn group(self, group: impl Into<String>) -> Self {
        let group = group.into();
        self.map(|r| r.in_group(group))
    }

    pub fn single(self) -> Self {
        self.map(Route::single)
    }

    pub fn build(self) -> Result<Route, TemplateError> {
        self.route
    }
}

/// Resolved binding of a request to a route plus its arguments so far.
#[derive(Debug)]
pub struct RouteMatch {
    route: Arc<Route>,
    arguments: Arguments,
}

impl RouteMatch {
    pub fn new(route: Arc<Route>) -> Self {
        Self {
            route,
            arguments: Arguments::new(),
        }
    }

    /// A match carrying the template variables extracted from the path.
    pub fn with_variables(route: Arc<Route>, variables: Vec<(String, String)>) -> Self {
        let mut route_match = Self::new(route);
        for (name, value) in variables {
            route_match.arguments.insert(name, ArgValue::Text(value));
        }
        route_match
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    /// Required parameters still without a value.
    pub fn missing(&self) -> impl Iterator<Item = &Param> {
        self.route
            .params()
            .iter()
            .filter(|p| p.required && !self.arguments.contains(&p.name))
    }

    pub fn is_fulfilled(&self) -> bool {
        self.missing().next().is_none()
    }

    pub fn into_parts(self) -> (Arc<Route>, Arguments) {
        (self.route, self.arguments)
    }
}
