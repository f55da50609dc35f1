//! Upstream link pool.
//!
//! # Responsibilities
//! - Hand out an idle link, or a fresh unconnected one when none is idle
//! - Take links back whether their socket is open or closed
//!
//! The free list is the only state mutated by concurrent sessions. The lock
//! is held for a push or a pop, never across I/O.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::net::connection::ProxyStats;
use crate::upstream::link::Link;

/// FIFO free list of upstream links.
///
/// There is no cap and no idle eviction: the pool grows to the high-water
/// mark of concurrent exchanges and stays there.
#[derive(Debug)]
pub struct LinkPool {
    idle: Mutex<VecDeque<Link>>,
    stats: Arc<ProxyStats>,
}

impl LinkPool {
    pub fn new(stats: Arc<ProxyStats>) -> Self {
        Self {
            idle: Mutex::new(VecDeque::new()),
            stats,
        }
    }

    /// Borrow a link. Pops the oldest idle link, or creates one.
    pub fn acquire(&self) -> Link {
        if let Some(link) = self.lock().pop_front() {
            tracing::trace!(link = %link.id(), open = link.is_open(), "Link reused from pool");
            return link;
        }
        Link::new(&self.stats)
    }

    /// Return a borrowed link. Closed links are kept and reconnect lazily.
    pub fn release(&self, link: Link) {
        tracing::trace!(link = %link.id(), open = link.is_open(), "Link returned to pool");
        self.lock().push_back(link);
    }

    /// Number of links currently idle in the pool.
    pub fn idle_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Link>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
