//! Startup orchestration.
//!
//! # Responsibilities
//! - Size the worker pool that drives the shared reactor
//! - Build the runtime every session and link task runs on
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One multi-threaded runtime: all workers poll the same I/O driver, and
//!   each session is a single task so its own steps never overlap

use std::num::NonZeroUsize;
use std::thread;

use tokio::runtime::{Builder, Runtime};

use crate::config::RuntimeConfig;

/// Worker threads to start: configured value, else hardware parallelism.
pub fn worker_count(config: &RuntimeConfig) -> usize {
    config.worker_threads.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    })
}

/// Build the shared runtime.
pub fn build_runtime(config: &RuntimeConfig) -> std::io::Result<Runtime> {
    let workers = worker_count(config);
    tracing::info!(workers, "Starting worker pool");
    Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("proxy-worker")
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_workers_win() {
        let config = RuntimeConfig {
            worker_threads: Some(3),
        };
        assert_eq!(worker_count(&config), 3);
    }

    #[test]
    fn default_workers_follow_hardware() {
        assert!(worker_count(&RuntimeConfig::default()) >= 1);
    }

    #[test]
    fn runtime_runs_tasks() {
        let runtime = build_runtime(&RuntimeConfig {
            worker_threads: Some(2),
        })
        .unwrap();
        let answer = runtime.block_on(async { tokio::spawn(async { 42 }).await.unwrap() });
        assert_eq!(answer, 42);
    }
}
