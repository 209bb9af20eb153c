//! jobstore
//!
//! Store durable de estados y logs de jobs de larga duración:
//! - `job_core`: modelo, capacidades (`PersistentStore`, `LoggerTail`, blob
//!   store, serializador) y normalización de ids.
//! - `job_persistence`: backend relacional (Diesel/Postgres) + blobs, store
//!   legacy en filesystem y fachada que migra del legacy al relacional.
//!
//! Uso típico: `open_store_from_env()` y luego `load`/`save`/`remove` y
//! `create_logger_tail` sobre la fachada.

pub use job_core::{JobId, JobRequest, JobState, JobStatus, LogEvent, LogLevel, LoggerTail, PersistentStore, StoreError,
                   ThrowableInfo};
pub use job_persistence::{open_store, open_store_from_env, InMemoryEngine, JobStatusStore, PgStatusStore, StoreConfig};

pub use job_core;
pub use job_persistence;
