//! Cola de logs de un job (append-only, consultable).
//!
//! Contrato común a todas las implementaciones:
//! - `append` sólo en modo escritura; en sólo lectura devuelve
//!   `StoreError::UnsupportedOperation` sin modificar nada.
//! - Los índices de línea empiezan en 0 y son contiguos.
//! - `log_events` devuelve una secuencia perezosa, finita y de un solo
//!   recorrido; no es un cursor reanudable.
//! - `flush`/`close` existen para el contrato de recursos de los llamadores.

mod memory;

pub use memory::InMemoryLoggerTail;

use crate::errors::StoreError;
use crate::model::{LogEvent, LogLevel};

/// Secuencia perezosa de eventos devuelta por `LoggerTail::log_events`.
pub type LogEventIter<'a> = Box<dyn Iterator<Item = Result<LogEvent, StoreError>> + 'a>;

/// Identidad de una cola respaldada por el almacén relacional.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TailKey {
    pub node_id: String,
    pub status_key: String,
}

pub trait LoggerTail: Send + Sync {
    /// Agrega un evento al final de la cola.
    fn append(&self, event: LogEvent) -> Result<(), StoreError>;

    /// Evento en la posición exacta `index` (None si no existe o es negativo).
    fn log_event(&self, index: i64) -> Result<Option<LogEvent>, StoreError>;

    /// Eventos con nivel >= `min_level` (todos si es None), saltando `offset`
    /// coincidencias y devolviendo a lo sumo `limit` (sin límite si
    /// `limit <= 0`).
    fn log_events(&self, min_level: Option<LogLevel>, offset: usize, limit: i64) -> LogEventIter<'_>;

    fn first_log_event(&self, min_level: Option<LogLevel>) -> Result<Option<LogEvent>, StoreError>;

    fn last_log_event(&self, min_level: Option<LogLevel>) -> Result<Option<LogEvent>, StoreError>;

    /// ¿Existe al menos un evento con nivel >= `min_level`?
    fn has_log_level(&self, min_level: LogLevel) -> Result<bool, StoreError>;

    /// Cantidad de eventos.
    fn size(&self) -> Result<usize, StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn is_readonly(&self) -> bool;

    /// Clave relacional si la cola está respaldada por el store relacional.
    fn storage_key(&self) -> Option<TailKey> {
        None
    }
}

/// Aplica `offset`/`limit` (con `limit <= 0` = sin límite) a un iterador.
pub fn page<'a, I>(iter: I, offset: usize, limit: i64) -> LogEventIter<'a>
    where I: Iterator<Item = Result<LogEvent, StoreError>> + 'a
{
    let skipped = iter.skip(offset);
    match usize::try_from(limit) {
        Ok(n) if n > 0 => Box::new(skipped.take(n)),
        _ => Box::new(skipped),
    }
}
