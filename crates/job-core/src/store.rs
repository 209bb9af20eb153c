//! Estrategia de persistencia de estados de jobs.
//!
//! Hay dos implementaciones concretas (filesystem legacy y relacional+blob)
//! y una fachada que las combina y migra de la primera a la segunda. La
//! fachada elige explícitamente qué estrategia consulta en cada paso.

use std::sync::Arc;

use crate::errors::StoreError;
use crate::model::{JobId, JobStatus};
use crate::tail::LoggerTail;

pub trait PersistentStore: Send + Sync {
    /// Carga el estado de un job. `Ok(None)` si no existe.
    fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError>;

    /// Guarda (crea o sobrescribe) el estado de un job.
    fn save(&self, status: &JobStatus) -> Result<(), StoreError>;

    /// Elimina el estado y los logs de un job. Un id inexistente no es error.
    fn remove(&self, id: &JobId) -> Result<(), StoreError>;

    /// Cola de logs para un job. `None` produce una cola sólo en memoria.
    fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError>;
}
