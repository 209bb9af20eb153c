//! Motor en memoria con paridad 1:1 respecto a Postgres.
//!
//! - Un juego de tablas por tenant (el tenant actual del hilo decide cuál).
//! - El mutex se sostiene durante toda la unidad de trabajo: las
//!   transacciones quedan serializadas, lo que cubre el bloqueo pesimista de
//!   `lock_summary`.
//! - Rollback por journal de deshacer: si la unidad de trabajo devuelve
//!   `Err`, se restauran las filas tocadas en orden inverso.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use job_core::current_tenant;

use super::{Edge, StatusSession, TransactionalEngine};
use crate::error::PersistenceError;
use crate::rows::{LogEntryRow, SummaryRow};

type SummaryKey = (String, String);
type LogKey = (String, String, i64);

#[derive(Default)]
struct Tables {
    summaries: BTreeMap<SummaryKey, SummaryRow>,
    logs: BTreeMap<LogKey, LogEntryRow>,
}

enum Undo {
    Summary(SummaryKey, Option<SummaryRow>),
    Log(LogKey, Option<LogEntryRow>),
}

#[derive(Default)]
pub struct InMemoryEngine {
    tenants: Mutex<HashMap<String, Tables>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn run<T, F>(&self, writable: bool, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        let tenant = current_tenant().unwrap_or_default();
        let mut tenants = self.tenants
                              .lock()
                              .map_err(|_| PersistenceError::TransientIo("in-memory engine lock poisoned".into()))?;
        let tables = tenants.entry(tenant).or_default();
        let mut session = MemorySession { tables, writable, journal: Vec::new() };
        let result = work(&mut session);
        if result.is_err() {
            session.rollback();
        }
        result
    }
}

impl TransactionalEngine for InMemoryEngine {
    fn run_read<T, F>(&self, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        self.run(false, work)
    }

    fn run_write<T, F>(&self, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        self.run(true, work)
    }
}

struct MemorySession<'a> {
    tables: &'a mut Tables,
    writable: bool,
    journal: Vec<Undo>,
}

impl MemorySession<'_> {
    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.writable {
            Ok(())
        } else {
            Err(PersistenceError::Unknown("cannot execute write in a read-only transaction".into()))
        }
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Summary(key, Some(row)) => {
                    self.tables.summaries.insert(key, row);
                }
                Undo::Summary(key, None) => {
                    self.tables.summaries.remove(&key);
                }
                Undo::Log(key, Some(row)) => {
                    self.tables.logs.insert(key, row);
                }
                Undo::Log(key, None) => {
                    self.tables.logs.remove(&key);
                }
            }
        }
    }

    fn log_range<'s>(&'s self,
                     node_id: &'s str,
                     status_key: &'s str,
                     min_level: Option<i32>)
                     -> impl DoubleEndedIterator<Item = &'s LogEntryRow> + 's {
        let from = (node_id.to_string(), status_key.to_string(), i64::MIN);
        let to = (node_id.to_string(), status_key.to_string(), i64::MAX);
        self.tables
            .logs
            .range(from..=to)
            .map(|(_, row)| row)
            .filter(move |row| min_level.map_or(true, |min| row.level >= min))
    }
}

fn summary_key(node_id: &str, status_key: &str) -> SummaryKey {
    (node_id.to_string(), status_key.to_string())
}

impl StatusSession for MemorySession<'_> {
    fn find_summary(&mut self, node_id: &str, status_key: &str) -> Result<Option<SummaryRow>, PersistenceError> {
        Ok(self.tables.summaries.get(&summary_key(node_id, status_key)).cloned())
    }

    fn lock_summary(&mut self, node_id: &str, status_key: &str) -> Result<Option<SummaryRow>, PersistenceError> {
        self.check_writable()?;
        self.find_summary(node_id, status_key)
    }

    fn insert_summary(&mut self, row: &SummaryRow) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let key = summary_key(&row.node_id, &row.status_key);
        if self.tables.summaries.contains_key(&key) {
            return Err(PersistenceError::UniqueViolation(format!("job_status_summary_pkey {key:?}")));
        }
        self.tables.summaries.insert(key.clone(), row.clone());
        self.journal.push(Undo::Summary(key, None));
        Ok(())
    }

    fn update_summary(&mut self, row: &SummaryRow) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let key = summary_key(&row.node_id, &row.status_key);
        if let Some(previous) = self.tables.summaries.insert(key.clone(), row.clone()) {
            self.journal.push(Undo::Summary(key, Some(previous)));
        } else {
            // UPDATE sin fila afectada: no crea nada.
            self.tables.summaries.remove(&key);
        }
        Ok(())
    }

    fn delete_summary(&mut self, node_id: &str, status_key: &str) -> Result<usize, PersistenceError> {
        self.check_writable()?;
        let key = summary_key(node_id, status_key);
        match self.tables.summaries.remove(&key) {
            Some(previous) => {
                self.journal.push(Undo::Summary(key, Some(previous)));
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn list_summaries(&mut self, node_id: &str, limit: i64) -> Result<Vec<SummaryRow>, PersistenceError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.tables
               .summaries
               .values()
               .filter(|row| row.node_id == node_id)
               .take(limit)
               .cloned()
               .collect())
    }

    fn insert_log_entry(&mut self, row: &LogEntryRow) -> Result<(), PersistenceError> {
        self.check_writable()?;
        if row.line_index < 0 {
            return Err(PersistenceError::CheckViolation("job_status_log_entry_line_index_check".into()));
        }
        let key = (row.node_id.clone(), row.status_key.clone(), row.line_index);
        if self.tables.logs.contains_key(&key) {
            return Err(PersistenceError::UniqueViolation(format!("job_status_log_entry_pkey {key:?}")));
        }
        self.tables.logs.insert(key.clone(), row.clone());
        self.journal.push(Undo::Log(key, None));
        Ok(())
    }

    fn delete_log_entries(&mut self, node_id: &str, status_key: &str) -> Result<usize, PersistenceError> {
        self.check_writable()?;
        let keys: Vec<LogKey> = self.log_range(node_id, status_key, None)
                                    .map(|row| (row.node_id.clone(), row.status_key.clone(), row.line_index))
                                    .collect();
        for key in &keys {
            if let Some(previous) = self.tables.logs.remove(key) {
                self.journal.push(Undo::Log(key.clone(), Some(previous)));
            }
        }
        Ok(keys.len())
    }

    fn find_log_entry(&mut self, node_id: &str, status_key: &str, line_index: i64)
                      -> Result<Option<LogEntryRow>, PersistenceError> {
        let key = (node_id.to_string(), status_key.to_string(), line_index);
        Ok(self.tables.logs.get(&key).cloned())
    }

    fn log_entries_after(&mut self,
                         node_id: &str,
                         status_key: &str,
                         min_level: Option<i32>,
                         after: Option<i64>,
                         limit: i64)
                         -> Result<Vec<LogEntryRow>, PersistenceError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.log_range(node_id, status_key, min_level)
               .filter(|row| after.map_or(true, |after| row.line_index > after))
               .take(limit)
               .cloned()
               .collect())
    }

    fn edge_log_entry(&mut self,
                      node_id: &str,
                      status_key: &str,
                      min_level: Option<i32>,
                      edge: Edge)
                      -> Result<Option<LogEntryRow>, PersistenceError> {
        let mut rows = self.log_range(node_id, status_key, min_level);
        let row = match edge {
            Edge::First => rows.next(),
            Edge::Last => rows.next_back(),
        };
        Ok(row.cloned())
    }

    fn count_log_entries(&mut self, node_id: &str, status_key: &str, min_level: Option<i32>)
                         -> Result<i64, PersistenceError> {
        let count = self.log_range(node_id, status_key, min_level).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}
