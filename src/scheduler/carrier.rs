//! Carriers: execution contexts standing in for OS threads
//!
//! A carrier owns at most one processor and runs at most one task at a
//! time. While it has no user task it sits on its root task.

use super::processor::ProcessorId;
use super::task::{Task, TaskRef};

/// Unique identifier for a carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarrierId(pub usize);

impl CarrierId {
    /// Get the numeric ID
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// An execution context
#[derive(Debug)]
pub struct Carrier {
    id: CarrierId,
    processor: Option<ProcessorId>,
    current: Option<TaskRef>,
    root: TaskRef,
    /// Reserved for multi-carrier spinning; never set by the drain loop
    spinning: bool,
}

impl Carrier {
    pub(crate) fn new(id: CarrierId) -> Self {
        Self {
            id,
            processor: None,
            current: None,
            root: Task::root(id),
            spinning: false,
        }
    }

    /// Get carrier ID
    pub fn id(&self) -> CarrierId {
        self.id
    }

    /// Processor this carrier owns
    pub fn processor(&self) -> Option<ProcessorId> {
        self.processor
    }

    /// User task currently executing, if any
    pub fn current_task(&self) -> Option<&TaskRef> {
        self.current.as_ref()
    }

    /// Idle placeholder task
    pub fn root(&self) -> &TaskRef {
        &self.root
    }

    /// Whether the carrier is spinning looking for work
    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub(crate) fn bind(&mut self, processor: ProcessorId) {
        self.processor = Some(processor);
    }

    pub(crate) fn unbind(&mut self) -> Option<ProcessorId> {
        self.processor.take()
    }

    pub(crate) fn set_current(&mut self, task: Option<TaskRef>) {
        self.current = task;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::TaskId;

    #[test]
    fn test_carrier_creation() {
        let carrier = Carrier::new(CarrierId(2));
        assert_eq!(carrier.id(), CarrierId(2));
        assert!(carrier.processor().is_none());
        assert!(carrier.current_task().is_none());
        assert!(!carrier.is_spinning());
        assert_eq!(carrier.root().id(), TaskId::ROOT);
        assert_eq!(carrier.root().carrier(), Some(CarrierId(2)));
    }

    #[test]
    fn test_bind_unbind() {
        let mut carrier = Carrier::new(CarrierId(0));
        carrier.bind(ProcessorId(3));
        assert_eq!(carrier.processor(), Some(ProcessorId(3)));
        assert_eq!(carrier.unbind(), Some(ProcessorId(3)));
        assert!(carrier.processor().is_none());
    }
}
