//! Processors: scheduling contexts with a bounded local run queue

use std::fmt::{self, Display};

use super::carrier::CarrierId;
use super::queue::{GlobalQueue, LocalRunQueue};
use crate::error::Result;

/// Unique identifier for a processor; also its index in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(pub usize);

impl ProcessorId {
    /// Get the numeric ID
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Processor state
///
/// Only `Idle`, `Running` and `Dead` are entered by this scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Waiting in the idle list
    Idle,
    /// Bound to a running carrier
    Running,
    /// Reserved: owner blocked in a system call
    InSyscall,
    /// Reserved: stopped for garbage collection
    StoppedForGc,
    /// Retired by a shrinking resize; never reused
    Dead,
}

/// A scheduling context
#[derive(Debug)]
pub struct Processor {
    id: ProcessorId,
    state: ProcessorState,
    run_queue: LocalRunQueue,
    owner: Option<CarrierId>,
}

impl Processor {
    pub(crate) fn new(id: ProcessorId) -> Self {
        Self {
            id,
            state: ProcessorState::Idle,
            run_queue: LocalRunQueue::new(),
            owner: None,
        }
    }

    /// Get processor ID
    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Whether this processor has been retired
    pub fn is_dead(&self) -> bool {
        self.state == ProcessorState::Dead
    }

    /// Carrier currently owning this processor
    pub fn owner(&self) -> Option<CarrierId> {
        self.owner
    }

    /// The local run queue
    pub fn run_queue(&self) -> &LocalRunQueue {
        &self.run_queue
    }

    pub(crate) fn run_queue_mut(&mut self) -> &mut LocalRunQueue {
        &mut self.run_queue
    }

    /// Bind to `carrier` and mark running
    pub(crate) fn acquire(&mut self, carrier: CarrierId) {
        self.owner = Some(carrier);
        self.state = ProcessorState::Running;
    }

    /// Drop the owner and park in the idle state
    pub(crate) fn release(&mut self) {
        self.owner = None;
        self.state = ProcessorState::Idle;
    }

    /// Retire the processor, moving everything it still holds to `global`.
    ///
    /// Returns how many tasks were moved.
    pub(crate) fn retire(&mut self, global: &mut GlobalQueue) -> Result<usize> {
        self.owner = None;
        self.state = ProcessorState::Dead;
        self.run_queue.drain_into(global)
    }
}
