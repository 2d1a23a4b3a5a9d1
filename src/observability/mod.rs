//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (counters, histograms)
//!     → spans.rs (per-exchange span with exchange and request IDs)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every event of an exchange
//! - Metrics are cheap (atomic increments behind the facade)
//! - Nothing is ever written to stdout, which may carry HTTP bytes

pub mod logging;
pub mod metrics;
pub mod spans;
