//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client, accounts, net produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
