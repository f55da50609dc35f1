//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream exchange:
//!     → timeouts.rs (arm deadline, spawn watcher)
//!     → connect / write / read, each raced against the watcher
//!     → on timeout: socket closed, link returned to the pool closed
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream exchange has a deadline
//! - No retries: a failed exchange becomes a 500 for that request only

pub mod timeouts;

pub use timeouts::DeadlineTimer;
