//! Serverless request dispatch.
//!
//! Turns HTTP/1.1 requests, either raw bytes on a duplex stream or requests
//! a container already parsed, into handler invocations and well-formed
//! responses.
//!
//! # Architecture Overview
//!
//! ```text
//!   stdin / inherited socket                          stdout / socket
//!          │                                                 ▲
//!          ▼                                                 │
//!   ┌──────────────┐   Request    ┌──────────────┐  Response ┌──────────────┐
//!   │   framing    │─────────────▶│   dispatch   │──────────▶│   framing    │
//!   │   decoder    │              │    engine    │           │   encoder    │
//!   └──────────────┘              └──────┬───────┘           └──────────────┘
//!                                        │
//!                  ┌─────────────┬───────┴──────┬──────────────┐
//!                  ▼             ▼              ▼              ▼
//!             ┌─────────┐  ┌──────────┐  ┌────────────┐  ┌───────────┐
//!             │ routing │  │   bind   │  │   codec    │  │ exception │
//!             │ (Router)│  │(Satisfier│  │ (Registry) │  │ handlers  │
//!             └─────────┘  └──────────┘  └────────────┘  └───────────┘
//!
//!   Cross-cutting: body (claim-once byte sources), http (request/response
//!   model), config, observability, lifecycle
//! ```

// Data model
pub mod body;
pub mod http;

// Request processing
pub mod bind;
pub mod codec;
pub mod dispatch;
pub mod framing;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::EngineConfig;
pub use dispatch::{DispatchEngine, DispatchError, Invocation, Outcome};
pub use framing::ServerlessApplication;
pub use lifecycle::Shutdown;
pub use routing::{Route, RouteTable};
