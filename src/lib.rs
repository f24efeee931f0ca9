//! # GMP Scheduler
//!
//! A single-carrier simulation of a work-stealing M:N task scheduler in the
//! style of goroutine runtimes: tasks (G) run on carriers (M) through
//! processors (P).
//!
//! ## Features
//!
//! - **Run-next fast path**: the most recently spawned task runs next
//! - **Bounded local rings**: 256 entries per processor, half spilled to the
//!   global queue on overflow
//! - **Global queue rebalancing**: takes from the global FIFO refill the
//!   local ring
//! - **Work stealing**: idle processors take the oldest half of a peer's ring
//!
//! ## Quick Start
//!
//! ```rust
//! use gmp_scheduler::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let mut runtime = Runtime::new();
//! runtime.initialize(Some(2)).unwrap();
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..5 {
//!     let counter = Arc::clone(&counter);
//!     runtime.spawn(move || {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     }).unwrap();
//! }
//!
//! runtime.run_to_completion().unwrap();
//! assert_eq!(counter.load(Ordering::Relaxed), 5);
//! assert_eq!(runtime.pending_count(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod error;
pub mod runtime;
pub mod scheduler;

/// Convenient re-exports for common functionality
pub mod prelude {
    pub use crate::error::{Error, InvariantViolation, Result};
    pub use crate::runtime::{Runtime, RuntimeConfig, MAXPROCS_ENV};
    pub use crate::scheduler::{
        ProcessorId, ProcessorState, Scheduler, SchedulerConfig, SchedulerStats, StealStrategy,
        TaskId, TaskRef, TaskState,
    };
}

pub use prelude::*;
