//! Work-stealing between processors
//!
//! A processor with nothing local and nothing global takes the oldest half
//! of a peer's ring. Victims are scanned in registration order unless the
//! random strategy is selected.

use rand::seq::SliceRandom;
use rand::thread_rng;

use super::processor::{Processor, ProcessorId};
use super::queue::{GlobalQueue, LocalRunQueue};
use super::task::TaskRef;
use crate::error::Result;

/// Victim selection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StealStrategy {
    /// Scan processors by identity, lowest first (default)
    #[default]
    RegistrationOrder,
    /// Scan the same victims in a shuffled order
    Random,
}

/// Work-stealing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StealStats {
    /// Total steal attempts
    pub steal_attempts: u64,
    /// Attempts that produced a task
    pub successful_steals: u64,
    /// Attempts where every victim was empty
    pub failed_steals: u64,
    /// Tasks taken from victims, including the one handed back directly
    pub tasks_stolen: u64,
}

/// Work-stealing coordinator
#[derive(Debug, Default)]
pub struct WorkStealer {
    strategy: StealStrategy,
    stats: StealStats,
}

impl WorkStealer {
    /// Create a new work stealer with the given strategy
    pub fn new(strategy: StealStrategy) -> Self {
        Self {
            strategy,
            stats: StealStats::default(),
        }
    }

    /// Try each peer of `thief` until one yields a task.
    pub fn steal(
        &mut self,
        processors: &mut [Processor],
        thief: ProcessorId,
        global: &mut GlobalQueue,
    ) -> Result<Option<TaskRef>> {
        self.stats.steal_attempts += 1;

        for victim in self.select_victims(thief, processors.len()) {
            let (thief_p, victim_p) = pair_mut(processors, thief.0, victim.0);
            let before = victim_p.run_queue().ring_len();

            let stolen = steal_from(thief_p.run_queue_mut(), victim_p.run_queue_mut(), global)?;
            if let Some(task) = stolen {
                let taken = before - victim_p.run_queue().ring_len();
                self.stats.successful_steals += 1;
                self.stats.tasks_stolen += taken as u64;
                log::debug!("{} stole {} tasks from {}", thief, taken, victim);
                return Ok(Some(task));
            }
        }

        self.stats.failed_steals += 1;
        Ok(None)
    }

    /// Every registered processor except the thief, in scan order
    fn select_victims(&self, thief: ProcessorId, count: usize) -> Vec<ProcessorId> {
        let mut victims: Vec<ProcessorId> = (0..count)
            .map(ProcessorId)
            .filter(|&id| id != thief)
            .collect();

        if self.strategy == StealStrategy::Random {
            victims.shuffle(&mut thread_rng());
        }
        victims
    }

    /// Get stealing statistics
    pub fn stats(&self) -> StealStats {
        self.stats.clone()
    }
}

/// Take `max(1, n / 2)` of the oldest ring entries from `victim`.
///
/// The first one is returned to the caller; the rest go into `thief`'s ring.
/// An empty victim yields `None` and leaves both queues untouched.
pub fn steal_from(
    thief: &mut LocalRunQueue,
    victim: &mut LocalRunQueue,
    global: &mut GlobalQueue,
) -> Result<Option<TaskRef>> {
    let mut batch = victim.steal_half().into_iter();
    let Some(first) = batch.next() else {
        return Ok(None);
    };
    for task in batch {
        thief.push_back(task, global)?;
    }
    Ok(Some(first))
}

fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs two distinct indices");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
