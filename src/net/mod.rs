//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop input)
//!     → connection.rs (session id, live-count guard)
//!     → Hand off to the HTTP session
//! ```

pub mod connection;
pub mod listener;

pub use connection::{LinkId, ProxyStats, SessionId, StatsSnapshot};
pub use listener::{Listener, ListenerError};
