//! Motor relacional consumido como "unidad de trabajo transaccional".
//!
//! `TransactionalEngine` abre una transacción, entrega una `StatusSession` a
//! la unidad de trabajo y hace commit si devuelve `Ok` o rollback si devuelve
//! `Err`. `StatusSession` expone sólo las consultas que necesita el store.
//!
//! Implementaciones:
//! - `PgEngine`: Postgres vía Diesel + r2d2.
//! - `InMemoryEngine`: paridad en memoria (tests / uso embebido).

mod memory;
pub mod pg;

pub use memory::InMemoryEngine;
pub use pg::{build_pool, build_pool_from_config, ConnectionProvider, PgEngine, PgPool, PoolProvider};

use crate::error::PersistenceError;
use crate::rows::{LogEntryRow, SummaryRow};

/// Extremo de la cola a consultar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    First,
    Last,
}

/// Consultas disponibles dentro de una transacción.
///
/// `min_level` filtra por `level >= min_level` (todos si es None).
pub trait StatusSession {
    fn find_summary(&mut self, node_id: &str, status_key: &str) -> Result<Option<SummaryRow>, PersistenceError>;

    /// Lee la fila con bloqueo pesimista de escritura (`FOR UPDATE`) hasta
    /// el fin de la transacción.
    fn lock_summary(&mut self, node_id: &str, status_key: &str) -> Result<Option<SummaryRow>, PersistenceError>;

    /// Inserta la fila. En Postgres un conflicto de clave con una inserción
    /// concurrente ya confirmada se resuelve como update.
    fn insert_summary(&mut self, row: &SummaryRow) -> Result<(), PersistenceError>;

    fn update_summary(&mut self, row: &SummaryRow) -> Result<(), PersistenceError>;

    fn delete_summary(&mut self, node_id: &str, status_key: &str) -> Result<usize, PersistenceError>;

    /// Resúmenes de un nodo ordenados por `status_key`.
    fn list_summaries(&mut self, node_id: &str, limit: i64) -> Result<Vec<SummaryRow>, PersistenceError>;

    fn insert_log_entry(&mut self, row: &LogEntryRow) -> Result<(), PersistenceError>;

    fn delete_log_entries(&mut self, node_id: &str, status_key: &str) -> Result<usize, PersistenceError>;

    fn find_log_entry(&mut self, node_id: &str, status_key: &str, line_index: i64)
                      -> Result<Option<LogEntryRow>, PersistenceError>;

    /// Página por keyset: filas con `line_index > after` en orden ascendente.
    fn log_entries_after(&mut self,
                         node_id: &str,
                         status_key: &str,
                         min_level: Option<i32>,
                         after: Option<i64>,
                         limit: i64)
                         -> Result<Vec<LogEntryRow>, PersistenceError>;

    fn edge_log_entry(&mut self,
                      node_id: &str,
                      status_key: &str,
                      min_level: Option<i32>,
                      edge: Edge)
                      -> Result<Option<LogEntryRow>, PersistenceError>;

    fn count_log_entries(&mut self, node_id: &str, status_key: &str, min_level: Option<i32>)
                         -> Result<i64, PersistenceError>;
}

pub trait TransactionalEngine: Send + Sync + 'static {
    fn run_read<T, F>(&self, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>;

    fn run_write<T, F>(&self, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>;
}
