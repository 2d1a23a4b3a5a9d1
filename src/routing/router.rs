//! Route lookup.
//!
//! # Responsibilities
//! - Store registered routes, error routes and filters
//! - Look up the most specific route(s) for a method and path
//! - Resolve status and error-type routes, group-local before global
//! - Report path matches for other methods so callers can answer 405
//!
//! # Design Decisions
//! - Immutable once handed to the engine (shared behind `Arc`, no locks)
//! - O(n) template scan (acceptable for typical route counts)
//! - All equally specific matches are returned; picking one is the
//!   caller's decision
//! - Explicit `NotFound` rather than a silent default

use std::error::Error;
use std::sync::Arc;

use http::{Method, StatusCode};
use thiserror::Error;

use crate::dispatch::HttpFilter;
use crate::routing::matcher::{Matcher, PathPatternMatcher, Specificity, TemplateError};
use crate::routing::route::{Route, RouteBuilder, RouteMatch};

/// Result of a method and path lookup.
#[derive(Debug)]
pub enum RouteLookup {
    /// One or more equally specific routes.
    Matches(Vec<RouteMatch>),
    /// The path matches routes, none of them for this method.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Resolves requests and failures to routes.
pub trait Router: Send + Sync {
    /// Most specific routes for `method` on `path`.
    fn find(&self, method: &Method, path: &str) -> RouteLookup;

    /// Route declared for `status`. `origin` is the route that produced it,
    /// if any, so that routes of its group take precedence.
    fn find_status_route(&self, origin: Option<&Route>, status: StatusCode) -> Option<RouteMatch>;

    /// Route declared for `error` or, walking its `source()` chain, for the
    /// nearest error that caused it.
    fn find_error_route(
        &self,
        origin: Option<&Route>,
        error: &(dyn Error + 'static),
    ) -> Option<RouteMatch>;

    /// Filters that apply to `method` on `path`, in registration order.
    fn filters_for(&self, method: &Method, path: &str) -> Vec<Arc<dyn HttpFilter>>;
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("invalid route template: {0}")]
    Template(#[from] TemplateError),

    #[error("route {0} has no method or template and can only be an error route")]
    NotRoutable(String),
}

struct StatusRoute {
    status: StatusCode,
    route: Arc<Route>,
}

struct ErrorRoute {
    type_name: &'static str,
    matches: fn(&(dyn Error + 'static)) -> bool,
    route: Arc<Route>,
}

struct FilterEntry {
    matcher: Box<dyn Matcher>,
    filter: Arc<dyn HttpFilter>,
}

fn is_error<E: Error + 'static>(error: &(dyn Error + 'static)) -> bool {
    error.is::<E>()
}

/// Routing table built at startup.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    status_routes: Vec<StatusRoute>,
    error_routes: Vec<ErrorRoute>,
    filters: Vec<FilterEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route from its builder.
    pub fn add(&mut self, builder: RouteBuilder) -> Result<&mut Self, RoutingError> {
        let route = builder.build()?;
        self.add_route(route)
    }

    pub fn add_route(&mut self, route: Route) -> Result<&mut Self, RoutingError> {
        if route.method().is_none() || route.template().is_none() {
            return Err(RoutingError::NotRoutable(route.describe()));
        }
        self.routes.push(Arc::new(route));
        Ok(self)
    }

    /// Register an error route for `status`. A route in a group only
    /// answers for routes of the same group.
    pub fn status_route(&mut self, status: StatusCode, route: Route) -> &mut Self {
        self.status_routes.push(StatusRoute {
            status,
            route: Arc::new(route),
        });
        self
    }

    /// Register an error route for errors of type `E`. A route in a group
    /// only answers for routes of the same group.
    pub fn error_route<E: Error + 'static>(&mut self, route: Route) -> &mut Self {
        self.error_routes.push(ErrorRoute {
            type_name: std::any::type_name::<E>(),
            matches: is_error::<E>,
            route: Arc::new(route),
        });
        self
    }

    /// Apply `filter` to paths matching `pattern` (`/**`, `/api/**` or an
    /// exact path).
    pub fn filter(&mut self, pattern: &str, filter: impl HttpFilter + 'static) -> &mut Self {
        self.filter_matching(PathPatternMatcher::new(pattern), filter)
    }

    pub fn filter_matching(
        &mut self,
        matcher: impl Matcher + 'static,
        filter: impl HttpFilter + 'static,
    ) -> &mut Self {
        self.filters.push(FilterEntry {
            matcher: Box::new(matcher),
            filter: Arc::new(filter),
        });
        self
    }

    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn best_matches(&self, method: &Method, path: &str) -> Vec<RouteMatch> {
        let mut best: Option<Specificity> = None;
        let mut matches = Vec::new();
        for route in &self.routes {
            let (Some(route_method), Some(template)) = (route.method(), route.template()) else {
                continue;
            };
            if route_method != method {
                continue;
            }
            let Some(variables) = template.match_path(path) else {
                continue;
            };
            let specificity = template.specificity();
            match best {
                Some(current) if specificity > current => continue,
                Some(current) if specificity == current => {}
                _ => {
                    best = Some(specificity);
                    matches.clear();
                }
            }
            matches.push(RouteMatch::with_variables(Arc::clone(route), variables));
        }
        matches
    }

    fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut allowed: Vec<Method> = Vec::new();
        for route in &self.routes {
            let (Some(method), Some(template)) = (route.method(), route.template()) else {
                continue;
            };
            if !allowed.contains(method) && template.match_path(path).is_some() {
                allowed.push(method.clone());
            }
        }
        allowed
    }

    /// Group-local candidates first, then global ones.
    fn scoped<'a, T>(
        entries: &'a [T],
        route_of: impl Fn(&T) -> &Arc<Route> + Copy + 'a,
        origin: Option<&'a Route>,
    ) -> impl Iterator<Item = &'a T> + 'a {
        let group = origin.and_then(Route::group);
        let local = entries
            .iter()
            .filter(move |e| group.is_some() && route_of(*e).group() == group);
        let global = entries.iter().filter(move |e| route_of(*e).group().is_none());
        local.chain(global)
    }
}

impl Router for RouteTable {
    fn find(&self, method: &Method, path: &str) -> RouteLookup {
        let mut matches = self.best_matches(method, path);
        if matches.is_empty() && *method == Method::HEAD {
            matches = self.best_matches(&Method::GET, path);
        }
        if !matches.is_empty() {
            return RouteLookup::Matches(matches);
        }
        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            RouteLookup::NotFound
        } else {
            RouteLookup::MethodNotAllowed(allowed)
        }
    }

    fn find_status_route(&self, origin: Option<&Route>, status: StatusCode) -> Option<RouteMatch> {
        Self::scoped(&self.status_routes, |e| &e.route, origin)
            .find(|e| e.status == status)
            .map(|e| RouteMatch::new(Arc::clone(&e.route)))
    }

    fn find_error_route(
        &self,
        origin: Option<&Route>,
        error: &(dyn Error + 'static),
    ) -> Option<RouteMatch> {
        let mut current = Some(error);
        while let Some(candidate) = current {
            if let Some(entry) = Self::scoped(&self.error_routes, |e| &e.route, origin)
                .find(|e| (e.matches)(candidate))
            {
                tracing::debug!(error_type = entry.type_name, "error route selected");
                return Some(RouteMatch::new(Arc::clone(&entry.route)));
            }
            current = candidate.source();
        }
        None
    }

    fn filters_for(&self, method: &Method, path: &str) -> Vec<Arc<dyn HttpFilter>> {
        self.filters
            .iter()
            .filter(|entry| entry.matcher.matches(method, path))
            .map(|entry| Arc::clone(&entry.filter))
            .collect()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.len())
            .field("status_routes", &self.status_routes.len())
            .field("error_routes", &self.error_routes.len())
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchError, Next, Outcome};
    use crate::http::{Request, Response};
    use async_trait::async_trait;

    fn ok() -> impl Fn(crate::dispatch::Invocation) -> futures_util::future::Ready<Result<Outcome, DispatchError>>
           + Send
           + Sync
           + 'static {
        |_| futures_util::future::ready(Ok(Outcome::Empty))
    }

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table
            .add(Route::get("/pets", ok()))
            .unwrap()
            .add(Route::get("/pets/{id}", ok()))
            .unwrap()
            .add(Route::get("/pets/mine", ok()))
            .unwrap()
            .add(Route::post("/pets", ok()))
            .unwrap()
            .add(Route::get("/files/{*rest}", ok()))
            .unwrap();
        table
    }

    fn templates(lookup: RouteLookup) -> Vec<String> {
        match lookup {
            RouteLookup::Matches(matches) => matches
                .iter()
                .map(|m| m.route().describe())
                .collect(),
            other => panic!("expected matches, got {other:?}"),
        }
    }

    #[test]
    fn literal_beats_variable() {
        let table = table();
        assert_eq!(templates(table.find(&Method::GET, "/pets/mine")), ["GET /pets/mine"]);
        assert_eq!(templates(table.find(&Method::GET, "/pets/7")), ["GET /pets/{id}"]);
        assert_eq!(
            templates(table.find(&Method::GET, "/files/a/b")),
            ["GET /files/{*rest}"]
        );
    }

    #[test]
    fn equal_specificity_returns_every_candidate() {
        let mut table = table();
        table.add(Route::get("/pets/{name}", ok())).unwrap();
        assert_eq!(table.find(&Method::GET, "/pets/7").len_matches(), 2);
    }

    #[test]
    fn wrong_method_lists_allowed_methods() {
        let table = table();
        match table.find(&Method::DELETE, "/pets") {
            RouteLookup::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, [Method::GET, Method::POST])
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(table.find(&Method::GET, "/nope"), RouteLookup::NotFound));
    }

    #[test]
    fn head_falls_back_to_get() {
        let table = table();
        assert_eq!(templates(table.find(&Method::HEAD, "/pets")), ["GET /pets"]);
    }

    #[test]
    fn error_routes_prefer_the_origin_group() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let mut table = RouteTable::new();
        table
            .error_route::<Boom>(Route::handler(ok()).with_status(StatusCode::CONFLICT))
            .error_route::<Boom>(Route::handler(ok()).in_group("pets"));
        let origin = Route::handler(ok()).in_group("pets");
        let stranger = Route::handler(ok()).in_group("users");

        let local = table.find_error_route(Some(&origin), &Boom).unwrap();
        assert_eq!(local.route().group(), Some("pets"));
        let global = table.find_error_route(Some(&stranger), &Boom).unwrap();
        assert_eq!(global.route().status(), Some(StatusCode::CONFLICT));
    }

    #[test]
    fn error_routes_follow_the_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("inner")]
        struct Inner;
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] Inner);

        let mut table = RouteTable::new();
        table.error_route::<Inner>(Route::handler(ok()));
        assert!(table.find_error_route(None, &Outer(Inner)).is_some());
        assert!(table
            .find_status_route(None, StatusCode::NOT_FOUND)
            .is_none());
    }

    #[test]
    fn error_only_routes_are_not_routable() {
        let mut table = RouteTable::new();
        assert!(matches!(
            table.add_route(Route::handler(ok())),
            Err(RoutingError::NotRoutable(_))
        ));
        assert!(matches!(
            table.add(Route::get("pets", ok())),
            Err(RoutingError::Template(_))
        ));
    }

    struct Tag;

    #[async_trait]
    impl HttpFilter for Tag {
        async fn filter(
            &self,
            request: &mut Request,
            next: Next<'_>,
        ) -> Result<Response, DispatchError> {
            next.run(request).await
        }
    }

    #[test]
    fn filters_are_scoped_by_pattern() {
        let mut table = table();
        table.filter("/**", Tag).filter("/pets/**", Tag).filter("/files", Tag);
        assert_eq!(table.filters_for(&Method::GET, "/pets/7").len(), 2);
        assert_eq!(table.filters_for(&Method::GET, "/other").len(), 1);
    }

    impl RouteLookup {
        fn len_matches(&self) -> usize {
            match self {
                RouteLookup::Matches(matches) => matches.len(),
                _ => 0,
            }
        }
    }
}
