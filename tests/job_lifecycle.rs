use std::sync::Arc;

use jobstore::job_persistence::FsLegacyStore;
use jobstore::{open_store, InMemoryEngine, JobId, JobRequest, JobState, JobStatus, LogEvent, LogLevel, PersistentStore,
               StoreConfig};

fn config(dir: &std::path::Path) -> StoreConfig {
    StoreConfig { node_id: "node-a".into(),
                  main_tenant: "main".into(),
                  blob_root: dir.join("blobs"),
                  legacy_root: dir.join("legacy"),
                  compress_blobs: false }
}

#[test]
fn full_job_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&config(dir.path()), Arc::new(InMemoryEngine::new())).unwrap();
    let id = JobId::parse("wiki/refactor/42");

    // el job arranca con su cola de escritura
    let mut status = JobStatus::new("refactoring", JobRequest::new(Some(id.clone())));
    status.request.properties.insert("pages".into(), serde_json::json!(["Main.WebHome", "Sandbox.WebHome"]));
    status.set_log_tail(store.create_logger_tail(Some(&id), false).unwrap());
    status.start();
    store.save(&status).unwrap();

    status.log_tail().append(LogEvent::new(LogLevel::Info, "moving {}").with_arguments(["Main.WebHome"])).unwrap();
    status.log_tail()
          .append(LogEvent::new(LogLevel::Error, "cannot move {}").with_arguments(["Sandbox.WebHome"])
                                                                  .with_throwable("AccessDenied",
                                                                                  Some("no edit right".into())))
          .unwrap();
    status.finish(Some(serde_json::json!({"moved": 1, "failed": 1})));
    store.save(&status).unwrap();

    let loaded = store.load(&id).unwrap().unwrap();
    assert_eq!(loaded.state, JobState::Finished);
    assert_eq!(loaded.result, Some(serde_json::json!({"moved": 1, "failed": 1})));
    assert_eq!(loaded.request.properties["pages"][1], "Sandbox.WebHome");
    assert!(dir.path().join("blobs/wiki/refactor/42/status.xml").is_file());

    let tail = loaded.log_tail();
    assert!(tail.is_readonly());
    assert_eq!(tail.size().unwrap(), 2);
    assert!(tail.has_log_level(LogLevel::Error).unwrap());
    let error = tail.first_log_event(Some(LogLevel::Warn)).unwrap().unwrap();
    assert_eq!(error.formatted_message(), "cannot move Sandbox.WebHome");
    assert_eq!(error.throwable.unwrap().type_name, "AccessDenied");

    store.remove(&id).unwrap();
    assert!(store.load(&id).unwrap().is_none());
    assert!(!dir.path().join("blobs/wiki").exists());
}

#[test]
fn legacy_records_move_on_first_access() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let legacy = FsLegacyStore::new(&cfg.legacy_root);
    let ids: Vec<JobId> = (0..3).map(|n| JobId::new(["wiki".to_string(), "export".to_string(), n.to_string()]))
                                .collect();
    for id in &ids {
        let mut status = JobStatus::new("export", JobRequest::new(Some(id.clone())));
        status.state = JobState::Finished;
        legacy.save(&status).unwrap();
        let tail = legacy.create_logger_tail(Some(id), false).unwrap();
        tail.append(LogEvent::new(LogLevel::Info, format!("exported {id}"))).unwrap();
    }

    let store = open_store(&cfg, Arc::new(InMemoryEngine::new())).unwrap();
    assert!(store.list(10).unwrap().is_empty());
    for id in &ids {
        let status = store.load(id).unwrap().unwrap();
        assert_eq!(status.log_tail().log_event(0).unwrap().unwrap().message, format!("exported {id}"));
        assert!(legacy.load(id).unwrap().is_none());
    }
    let listed: Vec<String> = store.list(10).unwrap().into_iter().map(|r| r.full_job_id).collect();
    assert_eq!(listed, ["wiki/export/0", "wiki/export/1", "wiki/export/2"]);
}
