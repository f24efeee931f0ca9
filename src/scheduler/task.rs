//! Tasks: the unit of work handed to the scheduler
//!
//! A task wraps a one-shot action together with an identity and a
//! lifecycle state. States only move forward:
//! `Idle -> Runnable -> Running -> Dead`.

use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::carrier::CarrierId;
use super::core::Scheduler;
use crate::error::InvariantViolation;

/// The work carried by a task
///
/// Actions receive the scheduler so they can spawn follow-up tasks.
pub type Action = Box<dyn FnOnce(&mut Scheduler) + Send + 'static>;

/// Shared handle to a task
pub type TaskRef = Arc<Task>;

/// Unique, monotonically increasing task identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Identity reserved for a carrier's root task
    pub const ROOT: TaskId = TaskId(0);

    /// Get the numeric ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TaskState {
    /// Created, not yet queued
    Idle = 0,
    /// Sitting in some run queue
    Runnable = 1,
    /// Currently executing on a carrier
    Running = 2,
    /// Finished; terminal
    Dead = 3,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Idle,
            1 => TaskState::Runnable,
            2 => TaskState::Running,
            _ => TaskState::Dead,
        }
    }

    /// Whether `to` is reachable from `self` in one step.
    ///
    /// Re-marking a runnable task runnable is allowed: tasks moved between
    /// queues are re-marked by the receiving queue.
    fn can_become(self, to: TaskState) -> bool {
        match (self, to) {
            (TaskState::Runnable, TaskState::Runnable) => true,
            (from, to) => to as u8 == from as u8 + 1,
        }
    }
}

/// Source of task identities
///
/// Atomic so identities stay unique even if tasks are created from several
/// threads. The first identity handed out is 1; 0 is [`TaskId::ROOT`].
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    last: AtomicU64,
}

impl TaskIdGenerator {
    /// Create a generator starting after the root identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next identity
    pub fn next_id(&self) -> TaskId {
        TaskId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A unit of work
pub struct Task {
    id: TaskId,
    state: AtomicU8,
    action: Mutex<Option<Action>>,
    /// Non-owning link to the carrier executing this task
    carrier: Mutex<Option<CarrierId>>,
}

impl Task {
    /// Create a new idle task. The action is not inspected here.
    pub(crate) fn new(id: TaskId, action: Option<Action>) -> TaskRef {
        Arc::new(Self {
            id,
            state: AtomicU8::new(TaskState::Idle as u8),
            action: Mutex::new(action),
            carrier: Mutex::new(None),
        })
    }

    /// Create the placeholder task a carrier sits on while idle
    pub(crate) fn root(carrier: CarrierId) -> TaskRef {
        let task = Self::new(TaskId::ROOT, None);
        *task.carrier.lock() = Some(carrier);
        task
    }

    /// Get task ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Carrier currently executing this task, if any
    pub fn carrier(&self) -> Option<CarrierId> {
        *self.carrier.lock()
    }

    /// Whether the action is still waiting to run
    pub fn has_action(&self) -> bool {
        self.action.lock().is_some()
    }

    /// Whether the task has finished
    pub fn is_dead(&self) -> bool {
        self.state() == TaskState::Dead
    }

    fn advance(&self, to: TaskState) -> Result<(), InvariantViolation> {
        let from = self.state();
        if !from.can_become(to) {
            return Err(InvariantViolation::IllegalTaskState { task: self.id, from, to });
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|raw| InvariantViolation::IllegalTaskState {
                task: self.id,
                from: TaskState::from_u8(raw),
                to,
            })
    }

    /// Mark the task runnable as it enters a queue
    pub(crate) fn make_runnable(&self) -> Result<(), InvariantViolation> {
        self.advance(TaskState::Runnable)
    }

    /// Move a runnable task onto `carrier` and hand back its action
    pub(crate) fn start(&self, carrier: CarrierId) -> Result<Action, InvariantViolation> {
        let mut slot = self.action.lock();
        if slot.is_none() {
            return Err(InvariantViolation::MissingAction { task: self.id });
        }
        if self.state() != TaskState::Runnable {
            return Err(InvariantViolation::IllegalTaskState {
                task: self.id,
                from: self.state(),
                to: TaskState::Running,
            });
        }
        self.advance(TaskState::Running)?;
        *self.carrier.lock() = Some(carrier);
        slot.take().ok_or(InvariantViolation::MissingAction { task: self.id })
    }

    /// Retire a task whose action has returned
    pub(crate) fn finish(&self) -> Result<(), InvariantViolation> {
        self.advance(TaskState::Dead)?;
        *self.carrier.lock() = None;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn dummy(id: u64) -> TaskRef {
        Self::new(TaskId(id), Some(Box::new(|_| {})))
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("carrier", &self.carrier())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_task_creation() {
        let task = Task::dummy(7);
        assert_eq!(task.id(), TaskId(7));
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.has_action());
        assert!(task.carrier().is_none());
    }

    #[test]
    fn test_sequential_ids_increase_by_one() {
        let ids = TaskIdGenerator::new();
        let got: Vec<u64> = (0..100).map(|_| ids.next_id().as_u64()).collect();
        let expected: Vec<u64> = (1..=100).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(TaskIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8000);
        assert!(!seen.contains(&TaskId::ROOT));
    }

    #[test]
    fn test_full_lifecycle() {
        let task = Task::dummy(1);
        task.make_runnable().unwrap();
        task.make_runnable().unwrap();
        assert_eq!(task.state(), TaskState::Runnable);

        let _action = task.start(CarrierId(0)).unwrap();
        assert_eq!(task.state(), TaskState::Running);
        assert_eq!(task.carrier(), Some(CarrierId(0)));
        assert!(!task.has_action());

        task.finish().unwrap();
        assert!(task.is_dead());
        assert!(task.carrier().is_none());
    }

    #[test]
    fn test_cannot_skip_states() {
        let task = Task::dummy(1);
        assert!(matches!(
            task.start(CarrierId(0)),
            Err(InvariantViolation::IllegalTaskState { from: TaskState::Idle, .. })
        ));
        assert!(task.finish().is_err());
        assert_eq!(task.state(), TaskState::Idle);
    }

    #[test]
    fn test_dead_is_terminal() {
        let task = Task::dummy(1);
        task.make_runnable().unwrap();
        let _ = task.start(CarrierId(0)).unwrap();
        task.finish().unwrap();

        assert!(task.make_runnable().is_err());
        assert!(task.finish().is_err());
        assert_eq!(task.state(), TaskState::Dead);
    }

    #[test]
    fn test_missing_action() {
        let task = Task::new(TaskId(9), None);
        task.make_runnable().unwrap();
        assert_eq!(
            task.start(CarrierId(0)).err(),
            Some(InvariantViolation::MissingAction { task: TaskId(9) })
        );
        assert_eq!(task.state(), TaskState::Runnable);
    }

    #[test]
    fn test_root_task() {
        let root = Task::root(CarrierId(4));
        assert_eq!(root.id(), TaskId::ROOT);
        assert_eq!(root.state(), TaskState::Idle);
        assert_eq!(root.carrier(), Some(CarrierId(4)));
        assert!(!root.has_action());
    }
}
