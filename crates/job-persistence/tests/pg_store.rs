mod test_support;

use std::sync::Arc;
use std::thread;

use job_core::{JobId, LogEvent, LogLevel};
use job_persistence::engine::{PgEngine, PoolProvider};
use test_support::{harness_with, status_with_logs, with_pool, Harness};
use uuid::Uuid;

type PgHarness = Harness<PgEngine<PoolProvider>>;

// Cada test usa un node_id propio: las filas de otros tests no interfieren.
fn pg_harness() -> Option<PgHarness> {
    with_pool(|pool| {
        let node = format!("test-{}", Uuid::new_v4());
        harness_with(Arc::new(PgEngine::new(PoolProvider { pool: pool.clone() })), &node)
    })
}

#[test]
fn pg_scenario_three_info_lines() {
    let Some(h) = pg_harness() else {
        eprintln!("skip pg_scenario_three_info_lines (no DATABASE_URL)");
        return;
    };
    let id = JobId::new(["wiki", "refactor", "42"]);
    h.store.save(&status_with_logs(&id, 3)).unwrap();

    let loaded = h.store.load(&id).unwrap().unwrap();
    assert_eq!(loaded.log_tail().size().unwrap(), 3);
    let messages: Vec<String> =
        loaded.log_tail().log_events(Some(LogLevel::Info), 0, 2).map(|e| e.unwrap().message).collect();
    assert_eq!(messages, ["line 0", "line 1"]);

    h.store.remove(&id).unwrap();
    assert!(h.store.load(&id).unwrap().is_none());
}

#[test]
fn pg_paging_crosses_windows() {
    let Some(h) = pg_harness() else {
        eprintln!("skip pg_paging_crosses_windows (no DATABASE_URL)");
        return;
    };
    let id = JobId::new(["bulk"]);
    let status = status_with_logs(&id, 0);
    for i in 0..430 {
        let level = if i % 10 == 0 { LogLevel::Warn } else { LogLevel::Debug };
        status.log_tail().append(LogEvent::new(level, format!("line {i}"))).unwrap();
    }
    h.store.save(&status).unwrap();

    let tail = h.store.create_logger_tail(Some(&id), true).unwrap();
    assert_eq!(tail.size().unwrap(), 430);
    assert_eq!(tail.log_events(None, 0, 0).count(), 430);
    let warns: Vec<String> = tail.log_events(Some(LogLevel::Warn), 40, 0).map(|e| e.unwrap().message).collect();
    assert_eq!(warns, ["line 400", "line 410", "line 420"]);
    assert_eq!(tail.last_log_event(Some(LogLevel::Warn)).unwrap().unwrap().message, "line 420");
    h.store.remove(&id).unwrap();
}

#[test]
fn pg_concurrent_saves_leave_one_row() {
    let Some(h) = pg_harness() else {
        eprintln!("skip pg_concurrent_saves_leave_one_row (no DATABASE_URL)");
        return;
    };
    let h = Arc::new(h);
    let id = JobId::new(["contended"]);
    let handles: Vec<_> = (0..6).map(|n| {
                                    let h = Arc::clone(&h);
                                    let id = id.clone();
                                    thread::spawn(move || {
                                        let mut status = status_with_logs(&id, 2);
                                        status.job_type = format!("writer-{n}");
                                        h.store.save(&status).unwrap();
                                    })
                                })
                                .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(h.store.list(50).unwrap().len(), 1);
    assert_eq!(h.store.load(&id).unwrap().unwrap().log_tail().size().unwrap(), 2);
    h.store.remove(&id).unwrap();
}

#[test]
fn pg_legacy_migration() {
    let Some(h) = pg_harness() else {
        eprintln!("skip pg_legacy_migration (no DATABASE_URL)");
        return;
    };
    let id = JobId::new(["wiki", "legacy"]);
    h.seed_legacy(&id, 5);
    assert_eq!(h.store.load(&id).unwrap().unwrap().log_tail().size().unwrap(), 5);
    assert_eq!(h.store.load(&id).unwrap().unwrap().log_tail().size().unwrap(), 5);
    assert_eq!(h.legacy.loads(), 1);
    h.store.remove(&id).unwrap();
}
