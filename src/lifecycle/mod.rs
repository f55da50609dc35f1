//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build worker pool → Bind listener → Accept
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Stop stats task → Runtime shutdown
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then runtime, then listener
//! - Shutdown is best-effort: in-flight sessions get a bounded grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
