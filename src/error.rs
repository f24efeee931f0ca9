//! Error types for the GMP scheduler
//!
//! Two families of failure exist. Caller mistakes (using the runtime before
//! it is initialized, naming a processor that does not exist) are ordinary
//! variants of [`Error`]. Broken scheduler invariants are wrapped in
//! [`Error::Fatal`]; after one of those the scheduler context is poisoned
//! and refuses further work.

use thiserror::Error;

use crate::scheduler::task::{TaskId, TaskState};

/// Main error type for scheduler operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An operation that needs an initialized runtime was called too early
    #[error("`{operation}` called before the scheduler was initialized")]
    NotInitialized {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// No processor with this identity was ever registered
    #[error("Processor {id} does not exist")]
    UnknownProcessor {
        /// Requested processor identity
        id: usize,
    },

    /// The processor exists but has been retired
    #[error("Processor {id} is dead")]
    ProcessorDead {
        /// Requested processor identity
        id: usize,
    },

    /// A task's action panicked; the task is dead and the drain stopped
    #[error("Task {task} panicked: {message}")]
    TaskPanicked {
        /// Task whose action panicked
        task: TaskId,
        /// Panic payload, when it was a string
        message: String,
    },

    /// A scheduler invariant was broken; the context must not continue
    #[error("Fatal scheduler invariant violation: {0}")]
    Fatal(#[from] InvariantViolation),

    /// The scheduler already hit a fatal violation earlier
    #[error("Scheduler is poisoned by an earlier fatal error: {cause}")]
    Poisoned {
        /// The violation that poisoned the scheduler
        cause: InvariantViolation,
    },
}

impl Error {
    /// Whether this error means the scheduler context must be abandoned
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_) | Error::Poisoned { .. })
    }
}

/// Internal scheduler defects
///
/// None of these can be caused by correct use of the public surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A task reached execution without an action to run
    #[error("task {task} has no action to execute")]
    MissingAction {
        /// Offending task
        task: TaskId,
    },

    /// A task was asked to make a transition its state does not allow
    #[error("task {task} cannot move from {from:?} to {to:?}")]
    IllegalTaskState {
        /// Offending task
        task: TaskId,
        /// State the task was found in
        from: TaskState,
        /// State it was asked to enter
        to: TaskState,
    },

    /// Ring overflow computed a batch that is not half the capacity
    #[error("overflow batch of {actual} tasks, expected {expected}")]
    OverflowBatchMismatch {
        /// Half of the ring capacity
        expected: usize,
        /// Batch size actually computed
        actual: usize,
    },

    /// A root-only operation ran while a user task was executing
    #[error("`{operation}` must run on the root task, but task {current} is executing")]
    NotOnRootTask {
        /// Name of the operation
        operation: &'static str,
        /// Task that was executing instead
        current: TaskId,
    },

    /// The carrier registry is full
    #[error("carrier limit of {limit} reached")]
    CarrierLimitExceeded {
        /// Configured maximum
        limit: usize,
    },
}

/// Convenient result type alias
pub type Result<T> = std::result::Result<T, Error>;
