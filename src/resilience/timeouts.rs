//! Timeout enforcement.
//!
//! # Responsibilities
//! - Arm a per-exchange deadline before any upstream I/O starts
//! - Run a watcher task that races the deadline against the exchange
//! - Expose a timed-out flag the exchange polls at each I/O checkpoint
//!
//! # Design Decisions
//! - Cancellation is racing, not cooperative: the watcher never touches the
//!   socket, it raises a flag and wakes the exchange, which then drops its
//!   in-flight I/O and closes the socket
//! - A wake-up of the watcher is only a timeout after re-checking the timer's
//!   current expiry, because a reset can race an already-completed wait
//! - Every arm bumps a generation so a stale watcher from an earlier exchange
//!   exits instead of observing the new deadline

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Expiry as seen by watchers: generation plus instant, `None` once canceled.
type Expiry = Option<(u64, Instant)>;

/// A reusable deadline timer with a racing watcher task.
#[derive(Debug)]
pub struct DeadlineTimer {
    expiry: watch::Sender<Expiry>,
    timed_out: Arc<AtomicBool>,
    fired: Arc<Notify>,
    generation: u64,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        let (expiry, _) = watch::channel(None);
        Self {
            expiry,
            timed_out: Arc::new(AtomicBool::new(false)),
            fired: Arc::new(Notify::new()),
            generation: 0,
        }
    }

    /// Arm the timer `timeout` from now and spawn its watcher.
    ///
    /// Clears the timed-out flag left by any previous exchange.
    pub fn arm(&mut self, timeout: Duration) -> JoinHandle<()> {
        self.generation += 1;
        self.timed_out.store(false, Ordering::SeqCst);
        self.fired = Arc::new(Notify::new());

        let generation = self.generation;
        self.expiry
            .send_replace(Some((generation, Instant::now() + timeout)));

        let watcher = Watcher {
            generation,
            expiry: self.expiry.subscribe(),
            timed_out: Arc::clone(&self.timed_out),
            fired: Arc::clone(&self.fired),
        };
        tokio::spawn(watcher.run())
    }

    /// Move the current deadline to `timeout` from now without re-arming.
    /// Only tests move a live deadline; exchanges arm once and cancel.
    #[cfg(test)]
    fn reset(&self, timeout: Duration) {
        self.expiry
            .send_replace(Some((self.generation, Instant::now() + timeout)));
    }

    /// Cancel the pending deadline. The watcher exits without a timeout.
    pub fn cancel(&self) {
        self.expiry.send_replace(None);
    }

    /// Whether the watcher confirmed the deadline elapsed.
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Resolves once the watcher has confirmed a timeout for the current arm.
    pub async fn fired(&self) {
        if self.timed_out() {
            return;
        }
        self.fired.notified().await;
    }
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Watcher {
    generation: u64,
    expiry: watch::Receiver<Expiry>,
    timed_out: Arc<AtomicBool>,
    fired: Arc<Notify>,
}

impl Watcher {
    async fn run(mut self) {
        loop {
            let at = match *self.expiry.borrow_and_update() {
                Some((generation, at)) if generation == self.generation => at,
                // canceled, or re-armed by a later exchange
                _ => return,
            };

            tokio::select! {
                changed = self.expiry.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = sleep_until(at) => {
                    // The wait completing is not enough: confirm against the
                    // expiry as it stands now.
                    let current = *self.expiry.borrow();
                    match current {
                        Some((generation, at))
                            if generation == self.generation && at <= Instant::now() =>
                        {
                            tracing::debug!(generation, "timer timeout");
                            self.timed_out.store(true, Ordering::SeqCst);
                            self.fired.notify_one();
                            return;
                        }
                        Some((generation, _)) if generation == self.generation => {
                            tracing::trace!(generation, "timer reset while waiting");
                        }
                        _ => return,
                    }
                }
            }
        }
    }
}
