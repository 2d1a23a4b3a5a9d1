//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → router.rs (scan templates, keep the most specific matches)
//!     → matcher.rs (template variables, specificity ranking)
//!     → RouteLookup: Matches | MethodNotAllowed(allowed) | NotFound
//!
//! Failure during dispatch:
//!     status or error type + originating route
//!     → router.rs (group-local error routes, then global ones)
//!     → RouteMatch for the error route, or none
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in the hot path (segment matching only)
//! - Deterministic: same input always yields the same candidates
//! - Ties in specificity are reported, never broken arbitrarily

pub mod matcher;
pub mod route;
pub mod router;

pub use matcher::{
    AndMatcher, Matcher, MethodMatcher, PathPatternMatcher, TemplateError, UriTemplate,
};
pub use route::{Handler, Param, ParamSource, ParamType, Route, RouteBuilder, RouteMatch};
pub use router::{RouteLookup, RouteTable, Router, RoutingError};
