//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gmp_scheduler::prelude::*;

/// Runtime initialized with `nprocs` processors
pub fn runtime(nprocs: usize) -> Runtime {
    let mut runtime = Runtime::new();
    runtime.initialize(Some(nprocs)).expect("bootstrap should succeed");
    runtime
}

/// Shared counter plus a factory for closures that bump it
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self(Arc::new(AtomicUsize::new(0)))
    }

    pub fn bump(&self) -> impl FnOnce() + Send + 'static {
        let inner = Arc::clone(&self.0);
        move || {
            inner.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tasks held anywhere, computed from the parts rather than `pending_count`
pub fn queued_everywhere(scheduler: &Scheduler) -> usize {
    scheduler.global_len()
        + scheduler
            .processors()
            .iter()
            .map(|p| p.run_queue().len())
            .sum::<usize>()
}
