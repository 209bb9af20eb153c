//! Cola de logs respaldada por la tabla `job_status_log_entry`.
//!
//! Estados por instancia (node_id, status_key):
//! - escritura: al inicializar borra todas las filas de la clave y arranca el
//!   contador de líneas en 0 (job nuevo o recién migrado).
//! - sólo lectura: no borra nada; se usa para jobs ya terminados.
//!
//! Cada `append` es una transacción propia; no hay estado local que volcar,
//! así que `flush`/`close` no hacen nada.
//!
//! El contador de líneas es atómico dentro del proceso. Sólo es correcto si
//! hay un único escritor vivo por clave (el job en ejecución es dueño de su
//! cola); dos procesos escribiendo la misma clave romperían el orden.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

use job_core::constants::{LOG_PAGE_SIZE, MAX_LOG_MESSAGE_LENGTH, MAX_THROWABLE_MESSAGE_LENGTH, MAX_THROWABLE_TYPE_LENGTH};
use job_core::model::truncate_with_marker;
use job_core::{LogEvent, LogEventIter, LogLevel, LoggerTail, StoreError, TailKey, ThrowableInfo};
use log::{debug, warn};
use serde_json::Value;

use crate::engine::{Edge, StatusSession, TransactionalEngine};
use crate::error::PersistenceError;
use crate::executor::TransactionalExecutor;
use crate::rows::LogEntryRow;

pub struct DatabaseLoggerTail<E: TransactionalEngine> {
    executor: TransactionalExecutor<E>,
    key: TailKey,
    readonly: bool,
    next_index: AtomicI64,
}

impl<E: TransactionalEngine> DatabaseLoggerTail<E> {
    fn new(executor: TransactionalExecutor<E>, key: TailKey, readonly: bool) -> Self {
        Self { executor, key, readonly, next_index: AtomicI64::new(0) }
    }

    /// Inicializa la cola en su propia transacción.
    pub fn initialize(executor: TransactionalExecutor<E>, key: TailKey, readonly: bool) -> Result<Self, StoreError> {
        if !readonly {
            executor.execute_write(|session| clear(session, &key))?;
        }
        Ok(Self::new(executor, key, readonly))
    }

    /// Inicializa la cola dentro de una transacción ya abierta.
    pub fn initialize_in(session: &mut dyn StatusSession,
                         executor: TransactionalExecutor<E>,
                         key: TailKey,
                         readonly: bool)
                         -> Result<Self, PersistenceError> {
        if !readonly {
            clear(session, &key)?;
        }
        Ok(Self::new(executor, key, readonly))
    }

    pub fn key(&self) -> &TailKey {
        &self.key
    }

    /// Inserta `event` en la transacción dada con el siguiente índice.
    pub(crate) fn append_in(&self, session: &mut dyn StatusSession, event: &LogEvent) -> Result<i64, PersistenceError> {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        session.insert_log_entry(&to_row(&self.key, index, event))?;
        Ok(index)
    }

    fn min_ordinal(min_level: Option<LogLevel>) -> Option<i32> {
        min_level.map(LogLevel::ordinal)
    }

    fn fetch_page(&self, min_level: Option<i32>, after: Option<i64>) -> Result<Vec<LogEntryRow>, StoreError> {
        let TailKey { node_id, status_key } = &self.key;
        self.executor
            .execute_read(|s| s.log_entries_after(node_id, status_key, min_level, after, LOG_PAGE_SIZE))
    }

    fn edge(&self, min_level: Option<LogLevel>, edge: Edge) -> Result<Option<LogEvent>, StoreError> {
        let TailKey { node_id, status_key } = &self.key;
        let min = Self::min_ordinal(min_level);
        let row = self.executor.execute_read(|s| s.edge_log_entry(node_id, status_key, min, edge))?;
        Ok(row.map(to_event))
    }
}

fn clear(session: &mut dyn StatusSession, key: &TailKey) -> Result<usize, PersistenceError> {
    let deleted = session.delete_log_entries(&key.node_id, &key.status_key)?;
    debug!("log tail reset node={} key={} deleted={deleted}", key.node_id, key.status_key);
    Ok(deleted)
}

/// Evento → fila, truncando columnas al tope con marca `...`.
pub(crate) fn to_row(key: &TailKey, line_index: i64, event: &LogEvent) -> LogEntryRow {
    // El payload completo permite reconstrucción exacta; si no se puede
    // serializar, la lectura cae a las columnas.
    let payload = serde_json::to_value(event).unwrap_or(Value::Null);
    LogEntryRow { node_id: key.node_id.clone(),
                  status_key: key.status_key.clone(),
                  line_index,
                  level: event.level.ordinal(),
                  ts: event.timestamp,
                  message: truncate_with_marker(&event.message, MAX_LOG_MESSAGE_LENGTH),
                  formatted_message: truncate_with_marker(&event.formatted_message(), MAX_LOG_MESSAGE_LENGTH),
                  throwable_type: event.throwable
                                       .as_ref()
                                       .map(|t| truncate_with_marker(&t.type_name, MAX_THROWABLE_TYPE_LENGTH)),
                  throwable_message: event.throwable
                                          .as_ref()
                                          .and_then(|t| t.message.as_deref())
                                          .map(|m| truncate_with_marker(m, MAX_THROWABLE_MESSAGE_LENGTH)),
                  payload }
}

/// Fila → evento. Si el payload no deserializa (esquema distinto o dato
/// corrupto) se reconstruye un evento aproximado desde las columnas.
pub(crate) fn to_event(row: LogEntryRow) -> LogEvent {
    match serde_json::from_value::<LogEvent>(row.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!("log row payload not decodable node={} key={} line={}: {e}; rebuilding from columns",
                  row.node_id,
                  row.status_key,
                  row.line_index);
            LogEvent { level: LogLevel::from_ordinal(row.level).unwrap_or(LogLevel::Info),
                       message: row.formatted_message,
                       arguments: Vec::new(),
                       timestamp: row.ts,
                       marker: None,
                       throwable: row.throwable_type
                                     .map(|type_name| ThrowableInfo { type_name, message: row.throwable_message }) }
        }
    }
}

impl<E: TransactionalEngine> LoggerTail for DatabaseLoggerTail<E> {
    fn append(&self, event: LogEvent) -> Result<(), StoreError> {
        if self.readonly {
            return Err(StoreError::UnsupportedOperation("append on a read-only log tail"));
        }
        // El índice se reserva una vez, fuera de los reintentos.
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        let row = to_row(&self.key, index, &event);
        self.executor.execute_write(|s| s.insert_log_entry(&row))
    }

    fn log_event(&self, index: i64) -> Result<Option<LogEvent>, StoreError> {
        if index < 0 {
            return Ok(None);
        }
        let TailKey { node_id, status_key } = &self.key;
        let row = self.executor.execute_read(|s| s.find_log_entry(node_id, status_key, index))?;
        Ok(row.map(to_event))
    }

    fn log_events(&self, min_level: Option<LogLevel>, offset: usize, limit: i64) -> LogEventIter<'_> {
        Box::new(LogEventPages::new(self, Self::min_ordinal(min_level), offset, limit))
    }

    fn first_log_event(&self, min_level: Option<LogLevel>) -> Result<Option<LogEvent>, StoreError> {
        self.edge(min_level, Edge::First)
    }

    fn last_log_event(&self, min_level: Option<LogLevel>) -> Result<Option<LogEvent>, StoreError> {
        self.edge(min_level, Edge::Last)
    }

    fn has_log_level(&self, min_level: LogLevel) -> Result<bool, StoreError> {
        Ok(self.edge(Some(min_level), Edge::First)?.is_some())
    }

    fn size(&self) -> Result<usize, StoreError> {
        let TailKey { node_id, status_key } = &self.key;
        let count = self.executor.execute_read(|s| s.count_log_entries(node_id, status_key, None))?;
        Ok(usize::try_from(count.max(0)).unwrap_or(usize::MAX))
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn storage_key(&self) -> Option<TailKey> {
        Some(self.key.clone())
    }
}

/// Secuencia perezosa paginada por "último `line_index` visto" (keyset), en
/// ventanas de `LOG_PAGE_SIZE`. Sigue siendo correcta con appends
/// concurrentes: nunca repite ni salta filas ya vistas.
struct LogEventPages<'a, E: TransactionalEngine> {
    tail: &'a DatabaseLoggerTail<E>,
    min_level: Option<i32>,
    after: Option<i64>,
    buffer: VecDeque<LogEntryRow>,
    skip: usize,
    remaining: Option<usize>,
    exhausted: bool,
}

impl<'a, E: TransactionalEngine> LogEventPages<'a, E> {
    fn new(tail: &'a DatabaseLoggerTail<E>, min_level: Option<i32>, offset: usize, limit: i64) -> Self {
        let remaining = usize::try_from(limit).ok().filter(|n| *n > 0);
        // El offset cuenta filas, no índices: un append fallido deja un hueco
        // en `line_index`.
        Self { tail, min_level, after: None, buffer: VecDeque::new(), skip: offset, remaining, exhausted: false }
    }
}

impl<E: TransactionalEngine> Iterator for LogEventPages<'_, E> {
    type Item = Result<LogEvent, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }
            if self.buffer.is_empty() {
                if self.exhausted {
                    return None;
                }
                match self.tail.fetch_page(self.min_level, self.after) {
                    Ok(rows) => {
                        if (rows.len() as i64) < LOG_PAGE_SIZE {
                            self.exhausted = true;
                        }
                        match rows.last() {
                            Some(last) => self.after = Some(last.line_index),
                            None => return None,
                        }
                        self.buffer.extend(rows);
                    }
                    Err(e) => {
                        self.exhausted = true;
                        return Some(Err(e));
                    }
                }
            }
            let row = self.buffer.pop_front()?;
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Some(Ok(to_event(row)));
        }
    }
}
