//! Run queues
//!
//! Each processor owns a [`LocalRunQueue`]: a one-slot run-next fast path in
//! front of a fixed ring of [`LOCAL_QUEUE_CAPACITY`] entries addressed by two
//! wrapping counters. When the ring is full, its older half spills into the
//! shared [`GlobalQueue`].

use std::collections::VecDeque;
use std::fmt::{self, Debug};

use super::task::TaskRef;
use crate::error::{InvariantViolation, Result};

/// Capacity of a processor's ring buffer
pub const LOCAL_QUEUE_CAPACITY: usize = 256;

/// Number of ring entries moved to the global queue on overflow
pub const OVERFLOW_BATCH: usize = LOCAL_QUEUE_CAPACITY / 2;

const CAP: u32 = LOCAL_QUEUE_CAPACITY as u32;

/// Bounded per-processor run queue
///
/// `tail - head` (wrapping) is always between 0 and the capacity.
pub struct LocalRunQueue {
    run_next: Option<TaskRef>,
    ring: Box<[Option<TaskRef>]>,
    head: u32,
    tail: u32,
    overflows: u64,
    overflowed_tasks: u64,
}

impl LocalRunQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            run_next: None,
            ring: (0..LOCAL_QUEUE_CAPACITY).map(|_| None).collect(),
            head: 0,
            tail: 0,
            overflows: 0,
            overflowed_tasks: 0,
        }
    }

    /// Insert a task.
    ///
    /// With `next` set the task takes the run-next slot and any previous
    /// occupant is pushed to the ring instead. A full ring spills half of
    /// itself plus the incoming task to `global`.
    pub fn push(&mut self, task: TaskRef, next: bool, global: &mut GlobalQueue) -> Result<()> {
        let task = if next {
            match self.run_next.replace(task) {
                Some(evicted) => evicted,
                None => return Ok(()),
            }
        } else {
            task
        };
        self.push_back(task, global)
    }

    /// Insert into the ring, bypassing the run-next slot
    pub fn push_back(&mut self, task: TaskRef, global: &mut GlobalQueue) -> Result<()> {
        if self.ring_len() < LOCAL_QUEUE_CAPACITY {
            self.ring[(self.tail % CAP) as usize] = Some(task);
            self.tail = self.tail.wrapping_add(1);
            return Ok(());
        }
        self.push_slow(task, global)
    }

    /// Move the oldest half of a full ring, plus `task`, to `global`.
    fn push_slow(&mut self, task: TaskRef, global: &mut GlobalQueue) -> Result<()> {
        let n = self.ring_len() / 2;
        if n != OVERFLOW_BATCH {
            return Err(InvariantViolation::OverflowBatchMismatch {
                expected: OVERFLOW_BATCH,
                actual: n,
            }
            .into());
        }

        let mut batch = Vec::with_capacity(n + 1);
        for i in 0..n as u32 {
            let slot = (self.head.wrapping_add(i) % CAP) as usize;
            batch.extend(self.ring[slot].take());
        }
        self.head = self.head.wrapping_add(n as u32);
        batch.push(task);

        let moved = batch.len();
        global.push_batch(batch)?;
        self.overflows += 1;
        self.overflowed_tasks += moved as u64;
        log::debug!("Run queue overflow moved {} tasks to the global queue", moved);
        Ok(())
    }

    /// Take the next task: the run-next slot first, then the ring in FIFO order
    pub fn pop(&mut self) -> Option<TaskRef> {
        if let Some(task) = self.run_next.take() {
            return Some(task);
        }
        if self.head == self.tail {
            return None;
        }
        let task = self.ring[(self.head % CAP) as usize].take();
        self.head = self.head.wrapping_add(1);
        task
    }

    /// Detach the oldest `max(1, len / 2)` ring entries for a thief.
    ///
    /// The run-next slot is never stolen. Returns an empty batch when the
    /// ring is empty.
    pub fn steal_half(&mut self) -> Vec<TaskRef> {
        let available = self.ring_len();
        if available == 0 {
            return Vec::new();
        }
        let n = (available / 2).max(1);

        let mut batch = Vec::with_capacity(n);
        for i in 0..n as u32 {
            let slot = (self.head.wrapping_add(i) % CAP) as usize;
            batch.extend(self.ring[slot].take());
        }
        self.head = self.head.wrapping_add(n as u32);
        batch
    }

    /// Move every queued task to `global`, preserving dequeue order
    pub fn drain_into(&mut self, global: &mut GlobalQueue) -> Result<usize> {
        let drained: Vec<TaskRef> = std::iter::from_fn(|| self.pop()).collect();
        let count = drained.len();
        global.push_batch(drained)?;
        Ok(count)
    }

    /// Whether both the run-next slot and the ring are empty
    pub fn is_empty(&self) -> bool {
        self.run_next.is_none() && self.head == self.tail
    }

    /// Tasks held, run-next slot included
    pub fn len(&self) -> usize {
        self.ring_len() + usize::from(self.run_next.is_some())
    }

    /// Tasks held in the ring only
    pub fn ring_len(&self) -> usize {
        self.tail.wrapping_sub(self.head) as usize
    }

    /// The task sitting in the run-next slot
    pub fn run_next(&self) -> Option<&TaskRef> {
        self.run_next.as_ref()
    }

    /// Raw ring head counter
    pub fn head(&self) -> u32 {
        self.head
    }

    /// Raw ring tail counter
    pub fn tail(&self) -> u32 {
        self.tail
    }

    /// Number of overflow spills so far
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Tasks moved to the global queue by overflow spills
    pub fn overflowed_tasks(&self) -> u64 {
        self.overflowed_tasks
    }

    #[cfg(test)]
    pub(crate) fn set_counters(&mut self, head: u32) {
        self.head = head;
        self.tail = head;
    }
}

impl Default for LocalRunQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for LocalRunQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRunQueue")
            .field("run_next", &self.run_next.as_ref().map(|t| t.id()))
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

/// Global FIFO queue shared by every processor
#[derive(Debug, Default)]
pub struct GlobalQueue {
    queue: VecDeque<TaskRef>,
    takes: u64,
    rebalanced: u64,
}

impl GlobalQueue {
    /// Create a new global queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task, marking it runnable
    pub fn push(&mut self, task: TaskRef) -> Result<()> {
        task.make_runnable()?;
        self.queue.push_back(task);
        Ok(())
    }

    /// Append a batch, keeping its relative order
    pub fn push_batch<I>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = TaskRef>,
    {
        for task in batch {
            self.push(task)?;
        }
        Ok(())
    }

    /// Pop the oldest task
    pub fn pop(&mut self) -> Option<TaskRef> {
        self.queue.pop_front()
    }

    /// Pop the oldest task for the caller and move up to `max` more into
    /// `local` through its ring path.
    pub fn take_with_rebalance(
        &mut self,
        local: &mut LocalRunQueue,
        max: usize,
    ) -> Result<Option<TaskRef>> {
        let Some(task) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.takes += 1;

        let n = self.queue.len().min(max);
        for _ in 0..n {
            match self.queue.pop_front() {
                Some(extra) => {
                    local.push_back(extra, self)?;
                    self.rebalanced += 1;
                }
                None => break,
            }
        }
        Ok(Some(task))
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the number of pending tasks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Successful takes so far
    pub fn takes(&self) -> u64 {
        self.takes
    }

    /// Tasks moved from here into local queues by rebalancing
    pub fn rebalanced(&self) -> u64 {
        self.rebalanced
    }

    /// Identities currently queued, oldest first
    pub fn ids(&self) -> impl Iterator<Item = super::task::TaskId> + '_ {
        self.queue.iter().map(|t| t.id())
    }
}
