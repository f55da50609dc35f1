//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Session needs a response
//!     → pool.rs (pop idle link, or create an unconnected one)
//!     → link.rs (reconnect if closed, exchange under deadline)
//!     → pool.rs (link pushed back, open or closed)
//! ```
//!
//! # Design Decisions
//! - One fixed upstream target, resolved once at startup
//! - A link is owned by exactly one session while borrowed; moving it in and
//!   out of the pool is the ownership transfer
//! - Closed links are recycled rather than destroyed

pub mod link;
pub mod pool;

pub use link::{Exchange, Link, LinkError, Target};
pub use pool::LinkPool;
