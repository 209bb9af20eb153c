//! job-persistence
//!
//! Backend relacional (Diesel/Postgres) + blobs del store de estados de
//! jobs, el store legacy en filesystem y la fachada que migra del segundo al
//! primero.
//!
//! Módulos:
//! - `engine`: motor transaccional (Postgres y paridad en memoria).
//! - `executor`: ejecutor con tenant fijo y reintentos.
//! - `log_tail`: cola de logs sobre `job_status_log_entry`.
//! - `blob` / `serializer`: payload del estado en el blob store.
//! - `legacy`: store legacy en filesystem.
//! - `relational` / `store`: store relacional + blob y fachada migradora.
//! - `config` / `migrations` / `schema`: configuración, migraciones
//!   embebidas y tablas Diesel.

pub mod blob;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod legacy;
pub mod log_tail;
pub mod migrations;
pub mod relational;
pub mod rows;
pub mod schema;
pub mod serializer;
pub mod store;

use std::sync::Arc;

use job_core::{IdNormalizer, StoreError};

pub use blob::{BlobAdapter, FileBlobStore};
pub use config::{init_dotenv, DbConfig, StoreConfig};
pub use engine::{build_pool, build_pool_from_config, ConnectionProvider, InMemoryEngine, PgEngine, PgPool, PoolProvider,
                 StatusSession, TransactionalEngine};
pub use error::PersistenceError;
pub use executor::TransactionalExecutor;
pub use legacy::{FileLoggerTail, FsLegacyStore};
pub use log_tail::DatabaseLoggerTail;
pub use relational::RelationalStatusStore;
pub use rows::{LogEntryRow, SummaryRow};
pub use serializer::JsonStatusSerializer;
pub use store::JobStatusStore;

/// Fachada sobre Postgres.
pub type PgStatusStore = JobStatusStore<PgEngine<PoolProvider>>;

/// Arma la fachada completa sobre `engine` con las rutas de `config`.
pub fn open_store<E: TransactionalEngine>(config: &StoreConfig, engine: Arc<E>) -> Result<JobStatusStore<E>, StoreError> {
    let blob_root = config.blob_root.clone();
    let blobs = BlobAdapter::initialize(move || FileBlobStore::open(blob_root), Arc::new(JsonStatusSerializer))?;
    let executor = TransactionalExecutor::new(engine, &config.main_tenant);
    let relational =
        RelationalStatusStore::new(config.node_id.clone(), IdNormalizer::default(), executor, blobs, config.compress_blobs);
    let legacy = Arc::new(FsLegacyStore::new(config.legacy_root.clone()));
    log::debug!("job status store opened node_id={} blob_root={} legacy_root={}",
                config.node_id,
                config.blob_root.display(),
                config.legacy_root.display());
    Ok(JobStatusStore::new(legacy, relational))
}

/// Construye pool (con migraciones), blob store, store legacy y fachada a
/// partir del entorno (.env incluido).
pub fn open_store_from_env() -> Result<PgStatusStore, StoreError> {
    let db = DbConfig::from_env()?;
    let pool = build_pool_from_config(&db).map_err(|e| StoreError::initialization_caused_by("cannot open job status database", e))?;
    open_store(&StoreConfig::from_env(), Arc::new(PgEngine::new(PoolProvider { pool })))
}
