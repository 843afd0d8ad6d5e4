//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (fmt layer)
//!     → Prometheus text rendering (CLI --metrics)
//! ```
//!
//! # Design Decisions
//! - Every lifecycle decision emits a structured event with the app name
//! - Metrics are cheap (no-ops without a recorder)

pub mod logging;
pub mod metrics;
