//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → stats.rs (periodic dump of the live/sequence counters)
//! ```
//!
//! # Design Decisions
//! - Session and link ids flow through every event as fields
//! - Metrics are cheap (atomic increments) and off unless enabled

pub mod logging;
pub mod metrics;
pub mod stats;
