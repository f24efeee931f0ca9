//! Public runtime surface: preconditions, idempotence, error kinds

mod common;

use common::Counter;
use gmp_scheduler::prelude::*;

#[test]
fn test_spawn_before_initialize() {
    let mut rt = Runtime::new();
    let err = rt.spawn(|| {}).unwrap_err();
    assert_eq!(err, Error::NotInitialized { operation: "spawn" });
    assert!(!err.is_fatal());
}

#[test]
fn test_run_before_initialize() {
    let mut rt = Runtime::new();
    assert_eq!(
        rt.run_to_completion().unwrap_err(),
        Error::NotInitialized { operation: "run_to_completion" }
    );
}

#[test]
fn test_pending_count_before_initialize() {
    let rt = Runtime::new();
    assert_eq!(rt.pending_count(), 0);
}

#[test]
fn test_initialize_twice_keeps_state() {
    let mut rt = Runtime::new();
    rt.initialize(Some(2)).unwrap();
    let counter = Counter::new();
    rt.spawn(counter.bump()).unwrap();

    rt.initialize(Some(5)).unwrap();
    let scheduler = rt.scheduler().unwrap();
    assert_eq!(scheduler.processor_count(), 2);
    assert_eq!(rt.pending_count(), 1);
}

#[test]
fn test_zero_processors_clamped() {
    let mut rt = Runtime::new();
    let scheduler = rt.initialize(Some(0)).unwrap();
    assert_eq!(scheduler.processor_count(), 1);
    assert_eq!(scheduler.active_carrier().processor(), Some(ProcessorId(0)));
}

#[test]
fn test_bootstrap_context() {
    let mut rt = Runtime::new();
    let scheduler = rt.initialize(Some(3)).unwrap();
    assert_eq!(scheduler.current_task().id(), TaskId::ROOT);
    assert_eq!(scheduler.idle_processor_count(), 2);
    assert_eq!(scheduler.processors()[0].state(), ProcessorState::Running);
}

#[test]
fn test_fatal_error_poisons_runtime() {
    let mut rt = Runtime::new();
    rt.initialize(Some(1)).unwrap();
    rt.spawn_with(|s: &mut Scheduler| {
        let _ = s.resize(4);
    })
    .unwrap();

    let err = rt.run_to_completion().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        Error::Poisoned { cause: InvariantViolation::NotOnRootTask { operation: "resize", .. } }
    ));
    assert!(matches!(rt.spawn(|| {}).unwrap_err(), Error::Poisoned { .. }));
}
