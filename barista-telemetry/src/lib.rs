//! # Barista Telemetry
//!
//! Structured logging, tracing spans and counters for the Barista assistant.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use barista_telemetry::{init_telemetry, info};
//!
//! fn main() -> Result<(), barista_telemetry::TelemetryError> {
//!     init_telemetry("barista")?;
//!     info!("ready to take orders");
//!     Ok(())
//! }
//! ```
//!
//! Set `RUST_LOG` to change the filter (default `info`).

pub mod init;
pub mod metrics;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{
    LogFormat, TelemetryConfig, TelemetryError, init_telemetry, init_with_otlp, shutdown_telemetry,
};
pub use metrics::{BaristaMetrics, metrics};
pub use spans::*;
