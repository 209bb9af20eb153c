use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{page, LogEventIter, LoggerTail};
use crate::errors::StoreError;
use crate::model::{LogEvent, LogLevel};

/// Cola de logs sólo en memoria (jobs anónimos/efímeros, estados recién
/// creados). No persiste nada.
#[derive(Default)]
pub struct InMemoryLoggerTail {
    events: RwLock<Vec<LogEvent>>,
    readonly: bool,
}

impl InMemoryLoggerTail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cola de sólo lectura con eventos precargados.
    pub fn readonly(events: Vec<LogEvent>) -> Self {
        Self { events: RwLock::new(events), readonly: true }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LogEvent>> {
        self.events.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<LogEvent>> {
        self.events.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn matching(&self, min_level: Option<LogLevel>) -> Vec<LogEvent> {
        self.read()
            .iter()
            .filter(|e| min_level.map_or(true, |min| e.level >= min))
            .cloned()
            .collect()
    }
}

impl LoggerTail for InMemoryLoggerTail {
    fn append(&self, event: LogEvent) -> Result<(), StoreError> {
        if self.readonly {
            return Err(StoreError::UnsupportedOperation("append on a read-only log tail"));
        }
        self.write().push(event);
        Ok(())
    }

    fn log_event(&self, index: i64) -> Result<Option<LogEvent>, StoreError> {
        let Ok(index) = usize::try_from(index) else {
            return Ok(None);
        };
        Ok(self.read().get(index).cloned())
    }

    fn log_events(&self, min_level: Option<LogLevel>, offset: usize, limit: i64) -> LogEventIter<'_> {
        // Snapshot: la secuencia no observa appends posteriores.
        page(self.matching(min_level).into_iter().map(Ok), offset, limit)
    }

    fn first_log_event(&self, min_level: Option<LogLevel>) -> Result<Option<LogEvent>, StoreError> {
        Ok(self.read().iter().find(|e| min_level.map_or(true, |min| e.level >= min)).cloned())
    }

    fn last_log_event(&self, min_level: Option<LogLevel>) -> Result<Option<LogEvent>, StoreError> {
        Ok(self.read().iter().rev().find(|e| min_level.map_or(true, |min| e.level >= min)).cloned())
    }

    fn has_log_level(&self, min_level: LogLevel) -> Result<bool, StoreError> {
        Ok(self.read().iter().any(|e| e.level >= min_level))
    }

    fn size(&self) -> Result<usize, StoreError> {
        Ok(self.read().len())
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }
}
