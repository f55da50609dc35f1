//! Session and link identity plus live-count tracking.
//!
//! # Responsibilities
//! - Hand out sequence ids for sessions and upstream links
//! - Track how many of each are alive, via RAII guards
//! - Count exchange outcomes and admission rejections for the stats report
//!
//! # Design Decisions
//! - Counters live in one `ProxyStats` owned by the server and shared by
//!   `Arc`, never in process-wide statics
//! - Counters are for observability only; the admission check reads the live
//!   count returned by the guard that was just taken
//! - Relaxed ordering for sequences (uniqueness only), SeqCst for live counts

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Unique identifier for a downstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Unique identifier for an upstream link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Point-in-time copy of the proxy counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sessions_live: u64,
    pub sessions_total: u64,
    pub links_live: u64,
    pub links_total: u64,
    pub exchanges: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejected: u64,
}

/// Counters shared by the server, its sessions and the link pool.
#[derive(Debug, Default)]
pub struct ProxyStats {
    sessions_live: AtomicU64,
    sessions_total: AtomicU64,
    links_live: AtomicU64,
    links_total: AtomicU64,
    exchanges: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    rejected: AtomicU64,
}

impl ProxyStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a new session. The guard decrements the live count on drop.
    pub fn track_session(self: &Arc<Self>) -> SessionGuard {
        let id = SessionId(self.sessions_total.fetch_add(1, Ordering::Relaxed));
        let live = self.sessions_live.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_live_sessions(live);
        SessionGuard {
            stats: Arc::clone(self),
            id,
            live,
        }
    }

    /// Record a new upstream link. The guard decrements the live count on drop.
    pub fn track_link(self: &Arc<Self>) -> LinkGuard {
        let id = LinkId(self.links_total.fetch_add(1, Ordering::Relaxed));
        let live = self.links_live.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_live_links(live);
        LinkGuard {
            stats: Arc::clone(self),
            id,
        }
    }

    pub fn record_exchange(&self) {
        self.exchanges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, timed_out: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        metrics::record_rejected_session();
    }

    pub fn live_sessions(&self) -> u64 {
        self.sessions_live.load(Ordering::SeqCst)
    }

    pub fn live_links(&self) -> u64 {
        self.links_live.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_live: self.sessions_live.load(Ordering::SeqCst),
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            links_live: self.links_live.load(Ordering::SeqCst),
            links_total: self.links_total.load(Ordering::Relaxed),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Guard that tracks a session's lifetime.
#[derive(Debug)]
pub struct SessionGuard {
    stats: Arc<ProxyStats>,
    id: SessionId,
    live: u64,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Live sessions right after this one was counted.
    pub fn live_at_open(&self) -> u64 {
        self.live
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let live = self.stats.sessions_live.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_live_sessions(live);
        tracing::trace!(session = %self.id, "Session released");
    }
}

/// Guard that tracks a link's lifetime.
#[derive(Debug)]
pub struct LinkGuard {
    stats: Arc<ProxyStats>,
    id: LinkId,
}

impl LinkGuard {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn stats(&self) -> &Arc<ProxyStats> {
        &self.stats
    }
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        let live = self.stats.links_live.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_live_links(live);
        tracing::trace!(link = %self.id, "Link destroyed");
    }
}
