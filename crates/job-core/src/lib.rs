//! job-core: modelo y contratos del almacén de estados y logs de jobs.
//!
//! - `model`: `JobId`, `JobStatus`, `LogEvent`, `LogLevel`.
//! - `tail`: contrato `LoggerTail` + cola en memoria.
//! - `key`: normalización de ids a claves acotadas (tabla y blob store).
//! - `store`: estrategia `PersistentStore`.
//! - `blob`: capacidades de blob store y serializador.
//! - `context`: tenant actual por hilo con guard de restauración.

pub mod blob;
pub mod constants;
pub mod context;
pub mod errors;
pub mod hashing;
pub mod key;
pub mod model;
pub mod store;
pub mod tail;

pub use blob::{Blob, BlobStore, StatusSerializer};
pub use context::{current_tenant, TenantContext};
pub use errors::{BoxError, StoreError};
pub use key::{EscapingFolderResolver, FolderResolver, IdNormalizer};
pub use model::{JobId, JobRequest, JobState, JobStatus, LogEvent, LogLevel, ThrowableInfo};
pub use store::PersistentStore;
pub use tail::{InMemoryLoggerTail, LogEventIter, LoggerTail, TailKey};
