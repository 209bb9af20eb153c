#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use job_core::{IdNormalizer, JobId, JobRequest, JobStatus, LogEvent, LogLevel, LoggerTail, PersistentStore,
               StoreError};
use job_persistence::config::DbConfig;
use job_persistence::engine::{build_pool, InMemoryEngine, PgPool, TransactionalEngine};
use job_persistence::{BlobAdapter, FileBlobStore, FsLegacyStore, JobStatusStore, JsonStatusSerializer,
                      RelationalStatusStore, TransactionalExecutor};
use once_cell::sync::Lazy;
use tempfile::TempDir;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 4) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    TEST_POOL.as_ref().map(f)
}

/// Store legacy que cuenta las llamadas que recibe.
pub struct CountingLegacy {
    inner: FsLegacyStore,
    pub loads: AtomicUsize,
    pub removes: AtomicUsize,
}

impl CountingLegacy {
    pub fn inner(&self) -> &FsLegacyStore {
        &self.inner
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

impl PersistentStore for CountingLegacy {
    fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(id)
    }

    fn save(&self, status: &JobStatus) -> Result<(), StoreError> {
        self.inner.save(status)
    }

    fn remove(&self, id: &JobId) -> Result<(), StoreError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(id)
    }

    fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError> {
        self.inner.create_logger_tail(id, readonly)
    }
}

pub struct Harness<E: TransactionalEngine> {
    pub store: JobStatusStore<E>,
    pub legacy: Arc<CountingLegacy>,
    pub dir: TempDir,
}

impl<E: TransactionalEngine> Harness<E> {
    pub fn blob_path(&self, relative: &str) -> std::path::PathBuf {
        self.dir.path().join("blobs").join(relative)
    }

    /// Deja un job sólo en el store legacy, con `lines` líneas INFO.
    pub fn seed_legacy(&self, id: &JobId, lines: usize) {
        let status = JobStatus::new("legacy-job", JobRequest::new(Some(id.clone())));
        self.legacy.inner().save(&status).unwrap();
        let tail = self.legacy.inner().create_logger_tail(Some(id), false).unwrap();
        for i in 0..lines {
            tail.append(LogEvent::new(LogLevel::Info, format!("legacy line {i}"))).unwrap();
        }
    }
}

pub fn harness_with<E: TransactionalEngine>(engine: Arc<E>, node_id: &str) -> Harness<E> {
    let dir = tempfile::tempdir().unwrap();
    let blob_root = dir.path().join("blobs");
    let blobs = BlobAdapter::initialize(move || FileBlobStore::open(blob_root), Arc::new(JsonStatusSerializer)).unwrap();
    let executor = TransactionalExecutor::new(engine, "main");
    let relational = RelationalStatusStore::new(node_id, IdNormalizer::default(), executor, blobs, true);
    let legacy = Arc::new(CountingLegacy { inner: FsLegacyStore::new(dir.path().join("legacy")),
                                           loads: AtomicUsize::new(0),
                                           removes: AtomicUsize::new(0) });
    let store = JobStatusStore::new(legacy.clone(), relational);
    Harness { store, legacy, dir }
}

pub fn memory_harness() -> Harness<InMemoryEngine> {
    harness_with(Arc::new(InMemoryEngine::new()), "node-1")
}

/// Estado nuevo con su cola en memoria y `lines` líneas INFO.
pub fn status_with_logs(id: &JobId, lines: usize) -> JobStatus {
    let status = JobStatus::new("refactoring", JobRequest::new(Some(id.clone())));
    for i in 0..lines {
        status.log_tail().append(LogEvent::new(LogLevel::Info, format!("line {i}"))).unwrap();
    }
    status
}
