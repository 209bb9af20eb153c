//! Fachada del store de estados de jobs.
//!
//! Combina dos estrategias `PersistentStore`: el store legacy en filesystem
//! y el relacional + blob. Consulta siempre primero el relacional; si el job
//! sólo existe en el legacy lo migra en el primer acceso (una sola vez) y
//! borra la copia legacy.
//!
//! Contrato de bloqueo:
//! - Toda llamada al store legacy ocurre bajo `filesystem_lock` (un único
//!   lock para todos los ids).
//! - El lock de filesystem puede sostenerse mientras corre una transacción
//!   (migración en `load`), pero nunca se adquiere desde dentro de una: el
//!   orden es siempre filesystem → base de datos.
//!
//! Errores:
//! - `load`/`save`/`remove` devuelven los fallos del backend relacional o de
//!   blobs envueltos con el id del job.
//! - La limpieza del legacy es best-effort: sus fallos sólo se registran.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use job_core::{InMemoryLoggerTail, JobId, JobStatus, LoggerTail, PersistentStore, StoreError};
use log::{debug, warn};

use crate::engine::TransactionalEngine;
use crate::relational::RelationalStatusStore;
use crate::rows::SummaryRow;

type SerializablePolicy = Box<dyn Fn(&JobStatus) -> bool + Send + Sync>;

pub struct JobStatusStore<E: TransactionalEngine> {
    legacy: Arc<dyn PersistentStore>,
    relational: RelationalStatusStore<E>,
    filesystem_lock: Mutex<()>,
    serializable: SerializablePolicy,
}

impl<E: TransactionalEngine> fmt::Debug for JobStatusStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStatusStore").field("node_id", &self.relational.node_id()).finish_non_exhaustive()
    }
}

impl<E: TransactionalEngine> JobStatusStore<E> {
    pub fn new(legacy: Arc<dyn PersistentStore>, relational: RelationalStatusStore<E>) -> Self {
        Self { legacy,
               relational,
               filesystem_lock: Mutex::new(()),
               serializable: Box::new(|status| status.serialized) }
    }

    /// Reemplaza el predicado que decide si un estado se persiste.
    pub fn with_serializable_policy<P>(mut self, policy: P) -> Self
        where P: Fn(&JobStatus) -> bool + Send + Sync + 'static
    {
        self.serializable = Box::new(policy);
        self
    }

    pub fn relational(&self) -> &RelationalStatusStore<E> {
        &self.relational
    }

    fn lock_filesystem(&self) -> MutexGuard<'_, ()> {
        // El lock no protege datos propios: un panic previo no invalida nada.
        self.filesystem_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Borra la copia legacy. Requiere el lock de filesystem tomado.
    fn cleanup_legacy(&self, _fs: &MutexGuard<'_, ()>, id: &JobId) {
        if let Err(e) = self.legacy.remove(id) {
            warn!("failed to remove legacy status for job [{id}]: {e}");
        }
    }

    fn persist(&self, status: &JobStatus) -> Result<bool, StoreError> {
        if !(self.serializable)(status) {
            debug!("status not serializable, skipping save id={:?}", status.id().map(JobId::to_string));
            return Ok(false);
        }
        self.relational.save(status)?;
        Ok(true)
    }

    pub fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        self.load_inner(id).map_err(|e| e.for_job(id.to_string()))
    }

    fn load_inner(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        match self.relational.load(id) {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => warn!("relational lookup failed for job [{id}], trying legacy store: {e}"),
        }

        let fs = self.lock_filesystem();
        // Otro hilo pudo migrarlo mientras esperábamos el lock.
        if let Ok(Some(status)) = self.relational.load(id) {
            return Ok(Some(status));
        }
        let Some(mut status) = self.legacy.load(id)? else {
            return Ok(None);
        };
        if self.persist(&status)? {
            self.cleanup_legacy(&fs, id);
            status.set_log_tail(self.relational.create_logger_tail(Some(id), true)?);
            debug!("job [{id}] migrated from legacy store");
        }
        Ok(Some(status))
    }

    pub fn save(&self, status: &JobStatus) -> Result<(), StoreError> {
        let attach = |e: StoreError| match status.id() {
            Some(id) => e.for_job(id.to_string()),
            None => e,
        };
        if !self.persist(status).map_err(attach)? {
            return Ok(());
        }
        if let Some(id) = status.id() {
            let fs = self.lock_filesystem();
            self.cleanup_legacy(&fs, id);
        }
        Ok(())
    }

    pub fn remove(&self, id: &JobId) -> Result<(), StoreError> {
        if id.is_empty() {
            return Ok(());
        }
        {
            let fs = self.lock_filesystem();
            self.cleanup_legacy(&fs, id);
        }
        self.relational.remove(id).map_err(|e| e.for_job(id.to_string()))
    }

    /// Cola de logs de un job.
    ///
    /// - `None`: cola sólo en memoria.
    /// - sólo lectura: dispara la migración como `load`; si falla, cae a la
    ///   cola legacy de sólo lectura.
    /// - escritura: borra primero la copia legacy y devuelve una cola nueva
    ///   del store relacional.
    pub fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError> {
        let Some(id) = id else {
            return Ok(Arc::new(InMemoryLoggerTail::new()));
        };
        if readonly {
            return match self.load_inner(id) {
                Ok(Some(status)) => Ok(Arc::clone(status.log_tail())),
                Ok(None) => self.relational.create_logger_tail(Some(id), true).map_err(|e| e.for_job(id.to_string())),
                Err(e) => {
                    warn!("migration failed for job [{id}], serving legacy log: {e}");
                    let _fs = self.lock_filesystem();
                    self.legacy.create_logger_tail(Some(id), true).map_err(|e| e.for_job(id.to_string()))
                }
            };
        }
        {
            let fs = self.lock_filesystem();
            self.cleanup_legacy(&fs, id);
        }
        self.relational.create_logger_tail(Some(id), false).map_err(|e| e.for_job(id.to_string()))
    }

    /// Resúmenes del nodo actual.
    pub fn list(&self, limit: i64) -> Result<Vec<SummaryRow>, StoreError> {
        self.relational.list(limit)
    }
}

impl<E: TransactionalEngine> PersistentStore for JobStatusStore<E> {
    fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        JobStatusStore::load(self, id)
    }

    fn save(&self, status: &JobStatus) -> Result<(), StoreError> {
        JobStatusStore::save(self, status)
    }

    fn remove(&self, id: &JobId) -> Result<(), StoreError> {
        JobStatusStore::remove(self, id)
    }

    fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError> {
        JobStatusStore::create_logger_tail(self, id, readonly)
    }
}
