mod test_support;

use std::sync::Arc;

use job_core::{JobId, LogEvent, LogLevel, PersistentStore, StoreError};
use job_persistence::engine::{StatusSession, TransactionalEngine};
use job_persistence::PersistenceError;
use test_support::{harness_with, memory_harness, Harness};

#[test]
fn legacy_job_is_migrated_exactly_once() {
    let h = memory_harness();
    let id = JobId::new(["wiki", "refactor", "7"]);
    h.seed_legacy(&id, 4);

    let first = h.store.load(&id).unwrap().expect("migrated status");
    assert_eq!(first.job_type, "legacy-job");
    assert_eq!(h.legacy.loads(), 1);
    let tail = first.log_tail();
    assert!(tail.is_readonly());
    assert!(tail.storage_key().is_some(), "tail must be backed by the relational store");
    assert_eq!(tail.size().unwrap(), 4);
    assert_eq!(tail.log_event(3).unwrap().unwrap().message, "legacy line 3");

    // la copia legacy ya no existe
    assert!(h.legacy.inner().root().read_dir().unwrap().next().is_none());

    let second = h.store.load(&id).unwrap().expect("status from relational store");
    assert_eq!(h.legacy.loads(), 1, "second load must not touch the legacy store");
    assert_eq!(second.log_tail().size().unwrap(), 4);
}

#[test]
fn unknown_job_is_not_found() {
    let h = memory_harness();
    assert!(h.store.load(&JobId::new(["nope"])).unwrap().is_none());
    assert_eq!(h.legacy.loads(), 1);
}

#[test]
fn readonly_tail_triggers_migration() {
    let h = memory_harness();
    let id = JobId::new(["wiki", "export"]);
    h.seed_legacy(&id, 2);

    let tail = h.store.create_logger_tail(Some(&id), true).unwrap();
    assert!(tail.is_readonly());
    assert!(tail.storage_key().is_some());
    assert_eq!(tail.size().unwrap(), 2);
    assert!(h.store.relational().load(&id).unwrap().is_some());
}

#[test]
fn write_tail_deletes_legacy_record() {
    let h = memory_harness();
    let id = JobId::new(["wiki", "fresh"]);
    h.seed_legacy(&id, 3);

    let tail = h.store.create_logger_tail(Some(&id), false).unwrap();
    assert!(!tail.is_readonly());
    assert_eq!(tail.size().unwrap(), 0);
    assert_eq!(h.legacy.removes(), 1);
    assert!(h.legacy.inner().load(&id).unwrap().is_none());

    tail.append(LogEvent::new(LogLevel::Info, "new run")).unwrap();
    assert!(h.store.load(&id).unwrap().is_none(), "a tail alone does not create a status");
}

#[test]
fn non_serializable_legacy_status_is_served_but_not_migrated() {
    let h = memory_harness();
    let id = JobId::new(["transient"]);
    h.seed_legacy(&id, 1);
    let h = Harness { store: h.store.with_serializable_policy(|_| false), ..h };

    let status = h.store.load(&id).unwrap().unwrap();
    assert!(status.log_tail().storage_key().is_none());
    assert_eq!(status.log_tail().size().unwrap(), 1);
    assert!(h.store.relational().load(&id).unwrap().is_none());
    assert!(h.legacy.inner().load(&id).unwrap().is_some());
}

/// Motor que falla en toda transacción.
struct BrokenEngine;

impl TransactionalEngine for BrokenEngine {
    fn run_read<T, F>(&self, _work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        Err(PersistenceError::Unknown("database is gone".into()))
    }

    fn run_write<T, F>(&self, _work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        Err(PersistenceError::Unknown("database is gone".into()))
    }
}

#[test]
fn readonly_tail_falls_back_to_legacy_when_migration_fails() {
    let h = harness_with(Arc::new(BrokenEngine), "node-1");
    let id = JobId::new(["wiki", "old"]);
    h.seed_legacy(&id, 2);

    let tail = h.store.create_logger_tail(Some(&id), true).unwrap();
    assert!(tail.is_readonly());
    assert!(tail.storage_key().is_none());
    assert_eq!(tail.size().unwrap(), 2);
    assert!(h.legacy.inner().load(&id).unwrap().is_some(), "legacy copy must survive a failed migration");
}

#[test]
fn database_failures_surface_with_job_id() {
    let h = harness_with(Arc::new(BrokenEngine), "node-1");
    let id = JobId::new(["wiki", "old"]);
    h.seed_legacy(&id, 1);

    let err = h.store.load(&id).unwrap_err();
    assert!(err.to_string().contains("wiki/old"), "{err}");
    assert!(matches!(err.root(), StoreError::Backend { .. }));

    let err = h.store.remove(&id).unwrap_err();
    assert!(matches!(err, StoreError::Job { .. }));
    assert!(h.legacy.inner().load(&id).unwrap().is_none(), "legacy removal happens before the database step");
}
