//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange
//!     → engine.rs (filters, route lookup, binding, invocation)
//!     → outcome.rs (Empty | Immediate | Deferred | Sequence | Response)
//!     → errors.rs / exception.rs (error routes, handlers, generic bodies)
//!     → encoded Response on the exchange
//! ```
//!
//! # Design Decisions
//! - Handler results are a closed set of outcomes matched once
//! - Request context travels explicitly in `Invocation`; nothing is
//!   ambient or thread-local
//! - Filter continuations are consumed when run, so a second run does not
//!   compile
//! - Router, satisfier, codecs and exception handlers are consumed through
//!   their interfaces only

pub mod engine;
pub mod errors;
pub mod exception;
pub mod filter;
pub mod outcome;
pub mod service;

pub use engine::{DispatchEngine, DispatchEngineBuilder};
pub use errors::{DispatchError, ErrorBody, MatchedRoute, ThrownError};
pub use exception::ExceptionHandlers;
pub use filter::{HttpFilter, Next, Terminal};
pub use outcome::{Invocation, Outcome, ResponseHandle};
pub use service::DispatchService;
