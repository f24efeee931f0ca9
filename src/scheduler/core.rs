//! Scheduler context
//!
//! Owns every processor and carrier, the global queue, the idle-processor
//! list and the task-id generator. Only one carrier is ever active, so all
//! of this is mutated through `&mut Scheduler` without locking.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::carrier::{Carrier, CarrierId};
use super::processor::{Processor, ProcessorId, ProcessorState};
use super::queue::GlobalQueue;
use super::steal::{StealStats, StealStrategy, WorkStealer};
use super::task::{Action, Task, TaskIdGenerator, TaskRef};
use crate::error::{Error, InvariantViolation, Result};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of carriers the registry may hold
    pub max_carriers: usize,
    /// Extra tasks pulled into the local ring on each global-queue take
    pub global_rebalance: usize,
    /// Work-stealing victim order
    pub steal_strategy: StealStrategy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_carriers: 10_000,
            global_rebalance: 1,
            steal_strategy: StealStrategy::RegistrationOrder,
        }
    }
}

/// Scheduler statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks created by spawn
    pub tasks_spawned: u64,
    /// Tasks that ran to completion
    pub tasks_completed: u64,
    /// Tasks whose action panicked
    pub tasks_panicked: u64,
    /// Ring overflows across all processors
    pub overflow_batches: u64,
    /// Tasks moved to the global queue by overflows
    pub overflowed_tasks: u64,
    /// Tasks taken from the global queue by find-runnable
    pub global_takes: u64,
    /// Tasks moved from the global queue into local rings
    pub global_rebalanced: u64,
    /// Work-stealing counters
    pub steal: StealStats,
}

/// The scheduler context
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    ids: TaskIdGenerator,
    processors: Vec<Processor>,
    carriers: Vec<Carrier>,
    /// Idle processors; the last entry is handed out first
    idle: Vec<ProcessorId>,
    global: GlobalQueue,
    stealer: WorkStealer,
    active: CarrierId,
    current: TaskRef,
    tasks_spawned: u64,
    tasks_completed: u64,
    tasks_panicked: u64,
    poisoned: Option<InvariantViolation>,
}

impl Scheduler {
    /// Create the bootstrap carrier and its root task, then size the
    /// processor registry to `nprocs`.
    pub fn bootstrap(config: SchedulerConfig, nprocs: usize) -> Result<Self> {
        if config.max_carriers == 0 {
            return Err(InvariantViolation::CarrierLimitExceeded { limit: 0 }.into());
        }

        let carrier = Carrier::new(CarrierId(0));
        let current = Arc::clone(carrier.root());
        let mut scheduler = Self {
            stealer: WorkStealer::new(config.steal_strategy),
            config,
            ids: TaskIdGenerator::new(),
            processors: Vec::new(),
            carriers: vec![carrier],
            idle: Vec::new(),
            global: GlobalQueue::new(),
            active: CarrierId(0),
            current,
            tasks_spawned: 0,
            tasks_completed: 0,
            tasks_panicked: 0,
            poisoned: None,
        };

        scheduler.ensure_on_root("initialize")?;
        scheduler.resize(nprocs)?;
        log::info!("Scheduler bootstrapped with {} processors", nprocs);
        Ok(scheduler)
    }

    /// Register a new carrier
    ///
    /// Only the bootstrap carrier is ever driven; extra carriers just hold
    /// a registry slot.
    pub fn add_carrier(&mut self) -> Result<CarrierId> {
        self.ensure_usable()?;
        if self.carriers.len() >= self.config.max_carriers {
            let limit = self.config.max_carriers;
            let violation = InvariantViolation::CarrierLimitExceeded { limit };
            return self.guard(Err(violation.into()));
        }
        let id = CarrierId(self.carriers.len());
        self.carriers.push(Carrier::new(id));
        Ok(id)
    }

    /// Resize the processor set to `nprocs`.
    ///
    /// The registry only grows. Processors past `nprocs` are retired and
    /// their queues drained to the global queue; retired processors are
    /// never brought back.
    pub fn resize(&mut self, nprocs: usize) -> Result<()> {
        self.ensure_usable()?;
        let result = self
            .ensure_on_root("resize")
            .map_err(Error::from)
            .and_then(|_| self.resize_inner(nprocs));
        self.guard(result)
    }

    fn resize_inner(&mut self, nprocs: usize) -> Result<()> {
        for i in self.processors.len()..nprocs {
            self.processors.push(Processor::new(ProcessorId(i)));
        }

        let bound = self.bind_active(nprocs);

        let mut retired = 0;
        for processor in self.processors.iter_mut().skip(nprocs) {
            if processor.is_dead() {
                continue;
            }
            let moved = processor.retire(&mut self.global)?;
            log::debug!("{} retired, {} tasks moved to the global queue", processor.id(), moved);
            retired += 1;
        }

        self.idle.clear();
        for processor in self.processors.iter_mut().take(nprocs) {
            if Some(processor.id()) == bound || processor.is_dead() {
                continue;
            }
            processor.release();
            self.idle.push(processor.id());
        }

        log::info!(
            "Resized to {} processors ({} idle, {} retired now, {} registered)",
            nprocs,
            self.idle.len(),
            retired,
            self.processors.len()
        );
        Ok(())
    }

    /// Keep or pick the active carrier's processor for a resize to `nprocs`
    fn bind_active(&mut self, nprocs: usize) -> Option<ProcessorId> {
        let carrier_id = self.active;
        let carrier = &mut self.carriers[carrier_id.0];

        if let Some(pid) = carrier.processor() {
            if pid.0 < nprocs && !self.processors[pid.0].is_dead() {
                self.processors[pid.0].acquire(carrier_id);
                return Some(pid);
            }
            carrier.unbind();
        }

        let pid = self.processors.iter().take(nprocs).find(|p| !p.is_dead()).map(|p| p.id())?;
        self.processors[pid.0].acquire(carrier_id);
        carrier.bind(pid);
        Some(pid)
    }

    /// Spawn a zero-argument closure
    pub fn spawn<F>(&mut self, f: F) -> Result<TaskRef>
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_with(move |_: &mut Scheduler| f())
    }

    /// Spawn a closure that receives the scheduler, so it can spawn more work
    pub fn spawn_with<F>(&mut self, f: F) -> Result<TaskRef>
    where
        F: FnOnce(&mut Scheduler) + Send + 'static,
    {
        self.ensure_usable()?;
        let task = self.new_task(Box::new(f));
        let result = self.enqueue_new(Arc::clone(&task));
        self.guard(result).map(|_| task)
    }

    /// Spawn directly onto the ring of a chosen processor
    pub fn spawn_on<F>(&mut self, processor: ProcessorId, f: F) -> Result<TaskRef>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_usable()?;
        match self.processors.get(processor.0) {
            None => return Err(Error::UnknownProcessor { id: processor.0 }),
            Some(p) if p.is_dead() => return Err(Error::ProcessorDead { id: processor.0 }),
            Some(_) => {}
        }

        let task = self.new_task(Box::new(move |_: &mut Scheduler| f()));
        let result = task.make_runnable().map_err(Error::from).and_then(|_| {
            self.processors[processor.0]
                .run_queue_mut()
                .push_back(Arc::clone(&task), &mut self.global)
        });
        self.guard(result).map(|_| task)
    }

    fn new_task(&mut self, action: Action) -> TaskRef {
        let task = Task::new(self.ids.next_id(), Some(action));
        self.tasks_spawned += 1;
        log::trace!("Spawned task {}", task.id());
        task
    }

    fn enqueue_new(&mut self, task: TaskRef) -> Result<()> {
        task.make_runnable()?;
        match self.carriers[self.active.0].processor() {
            Some(pid) => self.processors[pid.0].run_queue_mut().push(task, true, &mut self.global),
            None => self.global.push(task),
        }
    }

    /// Drain every reachable task, running each to completion.
    ///
    /// Returns how many tasks were executed. A panicking task stops the
    /// drain with [`Error::TaskPanicked`]; the rest stay queued.
    pub fn run_to_completion(&mut self) -> Result<usize> {
        self.ensure_usable()?;
        let result = self
            .ensure_on_root("run_to_completion")
            .map_err(Error::from)
            .and_then(|_| self.schedule());
        self.guard(result)
    }

    fn schedule(&mut self) -> Result<usize> {
        log::debug!("Drain started with {} pending tasks", self.pending_count());
        let mut executed = 0;
        while let Some(task) = self.find_runnable()? {
            self.execute(task)?;
            executed += 1;
            self.ensure_usable()?;
        }
        log::debug!("Drain finished after {} tasks", executed);
        Ok(executed)
    }

    /// Local queue, then the global queue, then a peer's queue
    fn find_runnable(&mut self) -> Result<Option<TaskRef>> {
        let Some(pid) = self.carriers[self.active.0].processor() else {
            return Ok(None);
        };

        if let Some(task) = self.processors[pid.0].run_queue_mut().pop() {
            return Ok(Some(task));
        }

        let local = self.processors[pid.0].run_queue_mut();
        if let Some(task) = self.global.take_with_rebalance(local, self.config.global_rebalance)? {
            return Ok(Some(task));
        }

        self.stealer.steal(&mut self.processors, pid, &mut self.global)
    }

    fn execute(&mut self, task: TaskRef) -> Result<()> {
        let carrier = self.active;
        let action = task.start(carrier)?;
        self.carriers[carrier.0].set_current(Some(Arc::clone(&task)));
        self.current = Arc::clone(&task);
        log::trace!("Executing task {}", task.id());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(self)));
        self.exit(&task)?;

        match outcome {
            Ok(()) => {
                self.tasks_completed += 1;
                Ok(())
            }
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                self.tasks_panicked += 1;
                log::warn!("Task {} panicked: {}", task.id(), message);
                Err(Error::TaskPanicked { task: task.id(), message })
            }
        }
    }

    /// Mark `task` dead and switch the carrier back to its root task
    fn exit(&mut self, task: &TaskRef) -> Result<()> {
        task.finish()?;
        let carrier = &mut self.carriers[self.active.0];
        self.current = Arc::clone(carrier.root());
        carrier.set_current(None);
        log::trace!("Task {} exited", task.id());
        Ok(())
    }

    fn ensure_on_root(
        &self,
        operation: &'static str,
    ) -> std::result::Result<(), InvariantViolation> {
        let root = self.carriers[self.active.0].root();
        if Arc::ptr_eq(&self.current, root) {
            Ok(())
        } else {
            Err(InvariantViolation::NotOnRootTask {
                operation,
                current: self.current.id(),
            })
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match &self.poisoned {
            Some(cause) => Err(Error::Poisoned { cause: cause.clone() }),
            None => Ok(()),
        }
    }

    /// Poison the context on the first fatal error that passes through
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::Fatal(violation)) = &result {
            if self.poisoned.is_none() {
                log::error!("Scheduler poisoned: {}", violation);
                self.poisoned = Some(violation.clone());
            }
        }
        result
    }

    /// Tasks queued anywhere: global queue, every ring, every run-next slot
    pub fn pending_count(&self) -> usize {
        self.global.len() + self.processors.iter().map(|p| p.run_queue().len()).sum::<usize>()
    }

    /// Whether an earlier fatal error has poisoned this scheduler
    pub fn poisoned(&self) -> Option<&InvariantViolation> {
        self.poisoned.as_ref()
    }

    /// Task currently executing (the root task between user tasks)
    pub fn current_task(&self) -> &TaskRef {
        &self.current
    }

    /// The carrier driving the drain loop
    pub fn active_carrier(&self) -> &Carrier {
        &self.carriers[self.active.0]
    }

    /// Look up a carrier
    pub fn carrier(&self, id: CarrierId) -> Option<&Carrier> {
        self.carriers.get(id.0)
    }

    /// Number of registered carriers
    pub fn carrier_count(&self) -> usize {
        self.carriers.len()
    }

    /// Look up a processor
    pub fn processor(&self, id: ProcessorId) -> Option<&Processor> {
        self.processors.get(id.0)
    }

    /// Every processor ever registered, dead ones included
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Registry size
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Processors not marked dead
    pub fn live_processor_count(&self) -> usize {
        self.processors.iter().filter(|p| p.state() != ProcessorState::Dead).count()
    }

    /// Idle list, in push order
    pub fn idle_processors(&self) -> &[ProcessorId] {
        &self.idle
    }

    /// Size of the idle list
    pub fn idle_processor_count(&self) -> usize {
        self.idle.len()
    }

    /// Tasks waiting in the global queue
    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    /// The global queue
    pub fn global_queue(&self) -> &GlobalQueue {
        &self.global
    }

    /// Configuration in effect
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let (overflow_batches, overflowed_tasks) = self.processors.iter().fold((0, 0), |(b, t), p| {
            (b + p.run_queue().overflows(), t + p.run_queue().overflowed_tasks())
        });

        SchedulerStats {
            tasks_spawned: self.tasks_spawned,
            tasks_completed: self.tasks_completed,
            tasks_panicked: self.tasks_panicked,
            overflow_batches,
            overflowed_tasks,
            global_takes: self.global.takes(),
            global_rebalanced: self.global.rebalanced(),
            steal: self.stealer.stats(),
        }
    }
}
