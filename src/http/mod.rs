//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept, spawn one session per connection)
//!     → session.rs (read request, forward, relay, keep-alive decision)
//!         → wire.rs (read head / read body rest)
//!         → request.rs, response.rs (parse heads)
//!     → Send to client
//! ```
//!
//! Only `Content-Length` framing is understood; chunked bodies and
//! pipelining are not supported.

pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod session;
pub mod wire;

pub use headers::{Headers, ParseError};
pub use request::{parse_request, Request};
pub use response::{parse_response, Response};
pub use server::{ProxyServer, ProxyState};
pub use session::{Session, SessionError};
