//! M:N scheduler implementation
//!
//! Tasks run on carriers through processors, each with a bounded local run
//! queue, backed by a global FIFO and work-stealing between processors.
//! Only one carrier is ever active; tasks run to completion.

pub mod carrier;
pub mod core;
pub mod processor;
pub mod queue;
pub mod steal;
pub mod task;

pub use self::core::{Scheduler, SchedulerConfig, SchedulerStats};
pub use carrier::{Carrier, CarrierId};
pub use processor::{Processor, ProcessorId, ProcessorState};
pub use queue::{GlobalQueue, LocalRunQueue, LOCAL_QUEUE_CAPACITY, OVERFLOW_BATCH};
pub use steal::{StealStats, StealStrategy, WorkStealer};
pub use task::{Action, Task, TaskId, TaskIdGenerator, TaskRef, TaskState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_creation() {
        let scheduler = Scheduler::bootstrap(SchedulerConfig::default(), 2);
        assert!(scheduler.is_ok());
        let scheduler = scheduler.unwrap();
        assert_eq!(scheduler.processor_count(), 2);
    }
}
