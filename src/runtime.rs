//! Runtime entry points
//!
//! [`Runtime`] is the public surface: initialize once, spawn tasks, drain
//! them. It holds the scheduler context only after initialization, so the
//! "not initialized" checks are a presence check on that context.

use crate::error::{Error, Result};
use crate::scheduler::core::{Scheduler, SchedulerConfig, SchedulerStats};
use crate::scheduler::task::TaskRef;

/// Environment variable overriding the processor count
pub const MAXPROCS_ENV: &str = "GMP_MAXPROCS";

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of processors (`None` = environment, then CPU count)
    pub max_processors: Option<usize>,
    /// Scheduler tuning
    pub scheduler: SchedulerConfig,
}

impl RuntimeConfig {
    /// Default configuration with `max_processors` read from [`MAXPROCS_ENV`]
    pub fn from_env() -> Self {
        Self {
            max_processors: env_processors(),
            ..Default::default()
        }
    }

    /// Pick the processor count: explicit request, then this config, then
    /// the environment, then the host CPU count. Never zero.
    pub fn resolve_processors(&self, requested: Option<usize>) -> usize {
        let nprocs = requested
            .or(self.max_processors)
            .or_else(env_processors)
            .unwrap_or_else(num_cpus::get);

        if nprocs == 0 {
            log::warn!("Processor count of 0 requested, using 1");
            return 1;
        }
        nprocs
    }
}

fn env_processors() -> Option<usize> {
    let raw = std::env::var(MAXPROCS_ENV).ok()?;
    let parsed = parse_processor_count(&raw);
    if parsed.is_none() {
        log::warn!("Ignoring {}={:?}: expected a positive integer", MAXPROCS_ENV, raw);
    }
    parsed
}

/// Parse a processor count; only positive integers are accepted
pub fn parse_processor_count(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

/// The scheduler runtime
#[derive(Debug, Default)]
pub struct Runtime {
    config: RuntimeConfig,
    scheduler: Option<Scheduler>,
}

impl Runtime {
    /// Create an uninitialized runtime with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an uninitialized runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self { config, scheduler: None }
    }

    /// Bootstrap the scheduler. Only the first call has any effect.
    pub fn initialize(&mut self, max_processors: Option<usize>) -> Result<&mut Scheduler> {
        if self.scheduler.is_some() {
            log::debug!("Runtime already initialized");
        } else {
            let nprocs = self.config.resolve_processors(max_processors);
            log::info!("Initializing runtime with {} processors", nprocs);
            self.scheduler = Some(Scheduler::bootstrap(self.config.scheduler.clone(), nprocs)?);
        }
        self.scheduler_for("initialize")
    }

    /// Whether [`Runtime::initialize`] has succeeded
    pub fn is_initialized(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Spawn a task
    pub fn spawn<F>(&mut self, f: F) -> Result<TaskRef>
    where
        F: FnOnce() + Send + 'static,
    {
        self.scheduler_for("spawn")?.spawn(f)
    }

    /// Spawn a task that can itself spawn through the scheduler it receives
    pub fn spawn_with<F>(&mut self, f: F) -> Result<TaskRef>
    where
        F: FnOnce(&mut Scheduler) + Send + 'static,
    {
        self.scheduler_for("spawn")?.spawn_with(f)
    }

    /// Run until no task is reachable anywhere; returns how many ran
    pub fn run_to_completion(&mut self) -> Result<usize> {
        self.scheduler_for("run_to_completion")?.run_to_completion()
    }

    /// Tasks queued across the global queue and every processor; 0 before
    /// initialization
    pub fn pending_count(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::pending_count)
    }

    /// Scheduler statistics, once initialized
    pub fn stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(Scheduler::stats)
    }

    /// The scheduler context, once initialized
    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// Mutable scheduler context, once initialized
    pub fn scheduler_mut(&mut self) -> Option<&mut Scheduler> {
        self.scheduler.as_mut()
    }

    /// Configuration this runtime was built with
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn scheduler_for(&mut self, operation: &'static str) -> Result<&mut Scheduler> {
        self.scheduler.as_mut().ok_or(Error::NotInitialized { operation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_processor_count() {
        assert_eq!(parse_processor_count("4"), Some(4));
        assert_eq!(parse_processor_count(" 12\n"), Some(12));
        assert_eq!(parse_processor_count("0"), None);
        assert_eq!(parse_processor_count("-2"), None);
        assert_eq!(parse_processor_count("four"), None);
        assert_eq!(parse_processor_count(""), None);
    }

    #[test]
    fn test_resolve_prefers_request_then_config() {
        let config = RuntimeConfig { max_processors: Some(3), ..Default::default() };
        assert_eq!(config.resolve_processors(Some(6)), 6);
        assert_eq!(config.resolve_processors(None), 3);
        assert_eq!(config.resolve_processors(Some(0)), 1);
    }

    #[test]
    fn test_uninitialized_runtime() {
        let mut runtime = Runtime::new();
        assert!(!runtime.is_initialized());
        assert_eq!(runtime.pending_count(), 0);
        assert!(runtime.stats().is_none());
        assert_eq!(
            runtime.spawn(|| {}).unwrap_err(),
            Error::NotInitialized { operation: "spawn" }
        );
        assert_eq!(
            runtime.run_to_completion().unwrap_err(),
            Error::NotInitialized { operation: "run_to_completion" }
        );
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut runtime = Runtime::new();
        runtime.initialize(Some(3)).unwrap();
        runtime.spawn(|| {}).unwrap();

        let scheduler = runtime.initialize(Some(8)).unwrap();
        assert_eq!(scheduler.processor_count(), 3);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_spawn_and_drain() {
        let mut runtime = Runtime::new();
        runtime.initialize(Some(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            runtime
                .spawn(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
        }
        assert_eq!(runtime.pending_count(), 5);
        assert_eq!(runtime.run_to_completion().unwrap(), 5);
        assert_eq!(counter.load(Ordering::Relaxed), 5);
        assert_eq!(runtime.pending_count(), 0);
    }
}
