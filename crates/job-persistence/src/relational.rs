//! Store relacional + blob.
//!
//! Por job: una fila en `job_status_summary`, N filas en
//! `job_status_log_entry` y un blob con el payload completo. La fila de
//! resumen decide si el estado existe en este backend.
//!
//! Notas operativas:
//! - `save` y `remove` toman el bloqueo pesimista de la fila de resumen antes
//!   de leer-modificar-escribir.
//! - El blob se escribe y se borra con ese bloqueo tomado, antes del commit:
//!   blob y resumen siguen el mismo orden de escritores. Si el blob falla la
//!   transacción se revierte.
//! - Una caída entre el blob y el commit deja un blob sin resumen, invisible.
//!   Si aun así falta el blob, `load` reconstruye el estado desde las columnas
//!   del resumen.

use std::sync::Arc;

use job_core::{IdNormalizer, InMemoryLoggerTail, JobId, JobRequest, JobState, JobStatus, LogEvent, LoggerTail,
               PersistentStore, StoreError, TailKey};
use log::{debug, warn};

use crate::blob::{locator_for, BlobAdapter};
use crate::engine::TransactionalEngine;
use crate::error::PersistenceError;
use crate::executor::TransactionalExecutor;
use crate::log_tail::DatabaseLoggerTail;
use crate::rows::SummaryRow;

pub struct RelationalStatusStore<E: TransactionalEngine> {
    node_id: String,
    normalizer: IdNormalizer,
    executor: TransactionalExecutor<E>,
    blobs: BlobAdapter,
    compress: bool,
}

impl<E: TransactionalEngine> RelationalStatusStore<E> {
    pub fn new(node_id: impl Into<String>,
               normalizer: IdNormalizer,
               executor: TransactionalExecutor<E>,
               blobs: BlobAdapter,
               compress: bool)
               -> Self {
        Self { node_id: node_id.into(), normalizer, executor, blobs, compress }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn executor(&self) -> &TransactionalExecutor<E> {
        &self.executor
    }

    pub fn tail_key(&self, id: &JobId) -> TailKey {
        TailKey { node_id: self.node_id.clone(), status_key: self.normalizer.database_key(Some(id)) }
    }

    pub fn blob_locator(&self, id: &JobId) -> String {
        locator_for(&self.normalizer.blob_key(Some(id)), self.compress)
    }

    fn summary_for(&self, key: &TailKey, id: &JobId, status: &JobStatus) -> SummaryRow {
        SummaryRow { node_id: key.node_id.clone(),
                     status_key: key.status_key.clone(),
                     full_job_id: self.normalizer.raw_id(Some(id)),
                     job_type: Some(status.job_type.clone()),
                     state: Some(status.state.as_str().to_string()),
                     start_date: status.start_date,
                     end_date: status.end_date,
                     serialized: status.serialized,
                     isolated: status.isolated,
                     cancelable: status.cancelable,
                     canceled: status.canceled,
                     blob_locator: Some(self.blob_locator(id)) }
    }

    fn read_only_tail(&self, key: TailKey) -> Result<Arc<dyn LoggerTail>, StoreError> {
        Ok(Arc::new(DatabaseLoggerTail::initialize(self.executor.clone(), key, true)?))
    }

    /// Carga resumen + blob y adjunta una cola de sólo lectura.
    pub fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        let key = self.tail_key(id);
        let summary = self.executor.execute_read(|s| s.find_summary(&key.node_id, &key.status_key))?;
        let Some(summary) = summary else {
            return Ok(None);
        };
        let loaded = match summary.blob_locator.as_deref() {
            Some(locator) => self.blobs.load(locator)?,
            None => None,
        };
        let mut status = match loaded {
            Some(status) => status,
            None => {
                warn!("job status blob missing for id={id} key={}; rebuilding from summary", key.status_key);
                status_from_summary(id, &summary)
            }
        };
        status.set_log_tail(self.read_only_tail(key)?);
        debug!("status loaded from relational store id={id}");
        Ok(Some(status))
    }

    /// Crea o actualiza el estado. Si la cola del estado no es la de esta
    /// clave (migración), sus eventos se copian a la tabla de logs en la misma
    /// transacción que el resumen.
    pub fn save(&self, status: &JobStatus) -> Result<(), StoreError> {
        let Some(id) = status.id() else {
            debug!("anonymous job status not persisted");
            return Ok(());
        };
        let key = self.tail_key(id);
        let row = self.summary_for(&key, id, status);
        let migrated_events = if status.log_tail().storage_key().as_ref() == Some(&key) {
            None
        } else {
            Some(status.log_tail().log_events(None, 0, 0).collect::<Result<Vec<LogEvent>, StoreError>>()?)
        };

        self.executor.execute_write(|s| {
                         match s.lock_summary(&key.node_id, &key.status_key)? {
                             Some(_) => s.update_summary(&row)?,
                             None => s.insert_summary(&row)?,
                         }
                         if let Some(events) = &migrated_events {
                             let tail = DatabaseLoggerTail::initialize_in(s, self.executor.clone(), key.clone(), false)?;
                             for event in events {
                                 tail.append_in(s, event)?;
                             }
                         }
                         if let Some(locator) = row.blob_locator.as_deref() {
                             self.blobs.store(status, locator).map_err(PersistenceError::Blob)?;
                         }
                         Ok(())
                     })?;
        debug!("status saved id={id} key={} migrated_logs={}",
               key.status_key,
               migrated_events.as_ref().map_or(0, Vec::len));
        Ok(())
    }

    /// Borra resumen, logs y blob. Un id inexistente no es error.
    pub fn remove(&self, id: &JobId) -> Result<(), StoreError> {
        let key = self.tail_key(id);
        self.executor.execute_write(|s| {
                         let summary = s.lock_summary(&key.node_id, &key.status_key)?;
                         // Reinicializar en escritura borra las filas de log.
                         DatabaseLoggerTail::initialize_in(s, self.executor.clone(), key.clone(), false)?;
                         if let Some(row) = summary {
                             s.delete_summary(&key.node_id, &key.status_key)?;
                             if let Some(locator) = row.blob_locator.as_deref() {
                                 self.blobs.delete(locator);
                             }
                         }
                         Ok(())
                     })?;
        debug!("status removed id={id} key={}", key.status_key);
        Ok(())
    }

    pub fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError> {
        let Some(id) = id else {
            return Ok(Arc::new(InMemoryLoggerTail::new()));
        };
        Ok(Arc::new(DatabaseLoggerTail::initialize(self.executor.clone(), self.tail_key(id), readonly)?))
    }

    /// Resúmenes de este nodo, ordenados por clave.
    pub fn list(&self, limit: i64) -> Result<Vec<SummaryRow>, StoreError> {
        self.executor.execute_read(|s| s.list_summaries(&self.node_id, limit))
    }
}

fn status_from_summary(id: &JobId, summary: &SummaryRow) -> JobStatus {
    let mut status = JobStatus::new(summary.job_type.clone().unwrap_or_default(), JobRequest::new(Some(id.clone())));
    status.state = summary.state.as_deref().and_then(|s| s.parse().ok()).unwrap_or(JobState::None);
    status.start_date = summary.start_date;
    status.end_date = summary.end_date;
    status.serialized = summary.serialized;
    status.isolated = summary.isolated;
    status.cancelable = summary.cancelable;
    status.canceled = summary.canceled;
    status
}

impl<E: TransactionalEngine> PersistentStore for RelationalStatusStore<E> {
    fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        RelationalStatusStore::load(self, id)
    }

    fn save(&self, status: &JobStatus) -> Result<(), StoreError> {
        RelationalStatusStore::save(self, status)
    }

    fn remove(&self, id: &JobId) -> Result<(), StoreError> {
        RelationalStatusStore::remove(self, id)
    }

    fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError> {
        RelationalStatusStore::create_logger_tail(self, id, readonly)
    }
}

#[cfg(test)]
mod tests {
    use job_core::LogLevel;

    use super::*;
    use crate::blob::FileBlobStore;
    use crate::engine::InMemoryEngine;
    use crate::serializer::JsonStatusSerializer;

    fn store(dir: &std::path::Path) -> RelationalStatusStore<InMemoryEngine> {
        let blobs = BlobAdapter::new(Arc::new(FileBlobStore::open(dir).unwrap()), Arc::new(JsonStatusSerializer));
        let executor = TransactionalExecutor::new(Arc::new(InMemoryEngine::new()), "main");
        RelationalStatusStore::new("node-1", IdNormalizer::default(), executor, blobs, true)
    }

    fn status_with_logs(id: &JobId, lines: usize) -> JobStatus {
        let mut status = JobStatus::new("refactoring", JobRequest::new(Some(id.clone())));
        for i in 0..lines {
            status.log_tail().append(LogEvent::new(LogLevel::Info, format!("line {i}"))).unwrap();
        }
        status
    }

    #[test]
    fn resave_keeps_logs_written_through_own_tail() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = JobId::new(["a"]);
        let mut status = JobStatus::new("t", JobRequest::new(Some(id.clone())));
        status.set_log_tail(store.create_logger_tail(Some(&id), false).unwrap());
        status.log_tail().append(LogEvent::new(LogLevel::Info, "live")).unwrap();
        store.save(&status).unwrap();
        status.log_tail().append(LogEvent::new(LogLevel::Info, "live 2")).unwrap();
        store.save(&status).unwrap();
        assert_eq!(store.load(&id).unwrap().unwrap().log_tail().size().unwrap(), 2);
    }

    #[test]
    fn migrating_save_replaces_logs() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = JobId::new(["a"]);
        store.save(&status_with_logs(&id, 5)).unwrap();
        store.save(&status_with_logs(&id, 2)).unwrap();
        let tail = store.load(&id).unwrap().unwrap().log_tail().clone();
        assert_eq!(tail.size().unwrap(), 2);
        assert_eq!(tail.last_log_event(None).unwrap().unwrap().message, "line 1");
    }

    #[test]
    fn missing_blob_rebuilds_from_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = JobId::new(["wiki", "x"]);
        let mut status = status_with_logs(&id, 1);
        status.state = JobState::Waiting;
        status.cancelable = true;
        store.save(&status).unwrap();
        store.blobs.delete(&store.blob_locator(&id));

        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Waiting);
        assert!(loaded.cancelable);
        assert_eq!(loaded.job_type, "refactoring");
        assert_eq!(loaded.log_tail().size().unwrap(), 1);
    }

    #[test]
    fn failed_blob_write_rolls_back_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        // Un archivo donde debería ir el directorio del blob.
        std::fs::write(dir.path().join("blocked"), b"").unwrap();
        let id = JobId::new(["blocked", "x"]);

        assert!(store.save(&status_with_logs(&id, 2)).is_err());
        assert!(store.load(&id).unwrap().is_none());
        assert!(store.list(10).unwrap().is_empty());
        assert_eq!(store.create_logger_tail(Some(&id), true).unwrap().size().unwrap(), 0);
    }

    #[test]
    fn long_ids_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = JobId::new(["a".repeat(127), "b".repeat(255), "c".repeat(200)]);
        store.save(&status_with_logs(&id, 1)).unwrap();
        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded.id(), Some(&id));
        assert_eq!(loaded.log_tail().size().unwrap(), 1);
        assert!(loaded.log_tail().is_readonly());
        assert_eq!(loaded.log_tail().storage_key(), Some(store.tail_key(&id)));
    }

    #[test]
    fn remove_clears_everything_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = JobId::new(["a", "b"]);
        store.save(&status_with_logs(&id, 3)).unwrap();
        assert!(dir.path().join("a/b/status.xml.zip").exists());

        store.remove(&id).unwrap();
        assert!(store.load(&id).unwrap().is_none());
        assert!(!dir.path().join("a/b/status.xml.zip").exists());
        assert_eq!(store.create_logger_tail(Some(&id), true).unwrap().size().unwrap(), 0);
        store.remove(&id).unwrap();
    }

    #[test]
    fn list_returns_node_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for n in ["b", "a", "c"] {
            store.save(&status_with_logs(&JobId::new([n]), 0)).unwrap();
        }
        let keys: Vec<String> = store.list(2).unwrap().into_iter().map(|r| r.status_key).collect();
        assert_eq!(keys, ["a", "b"]);
    }
}
