//! Store legacy sobre filesystem (origen de la migración).
//!
//! Una carpeta por job bajo `root`, con los segmentos que produce el
//! `FolderResolver`:
//! - `status.json`: el `JobStatus` serializado.
//! - `log.jsonl`: un `LogEvent` JSON por línea.
//!
//! No sincroniza accesos concurrentes: la fachada serializa toda llamada con
//! su lock de filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use job_core::tail::page;
use job_core::{EscapingFolderResolver, FolderResolver, InMemoryLoggerTail, JobId, JobStatus, LogEvent, LogEventIter,
               LogLevel, LoggerTail, PersistentStore, StoreError};
use log::{debug, warn};

const STATUS_FILE: &str = "status.json";
const LOG_FILE: &str = "log.jsonl";

pub struct FsLegacyStore {
    root: PathBuf,
    resolver: Arc<dyn FolderResolver>,
}

impl FsLegacyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_resolver(root, Arc::new(EscapingFolderResolver))
    }

    pub fn with_resolver(root: impl Into<PathBuf>, resolver: Arc<dyn FolderResolver>) -> Self {
        Self { root: root.into(), resolver }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder(&self, id: &JobId) -> PathBuf {
        let mut dir = self.root.clone();
        dir.extend(self.resolver.folder_segments(id));
        dir
    }

    fn remove_file(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Borra carpetas vacías desde `dir` hacia arriba, sin pasar de la raíz.
    fn prune(&self, dir: &Path) {
        let mut current = Some(dir);
        while let Some(d) = current {
            if d == self.root.as_path() || !d.starts_with(&self.root) || fs::remove_dir(d).is_err() {
                break;
            }
            current = d.parent();
        }
    }
}

impl PersistentStore for FsLegacyStore {
    fn load(&self, id: &JobId) -> Result<Option<JobStatus>, StoreError> {
        let dir = self.folder(id);
        let file = match File::open(dir.join(STATUS_FILE)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut status: JobStatus = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::backend(format!("corrupt legacy status in {}", dir.display()), e))?;
        status.set_log_tail(Arc::new(FileLoggerTail::open(dir.join(LOG_FILE), true)?));
        debug!("legacy status loaded id={id}");
        Ok(Some(status))
    }

    fn save(&self, status: &JobStatus) -> Result<(), StoreError> {
        let Some(id) = status.id() else {
            return Ok(());
        };
        let dir = self.folder(id);
        fs::create_dir_all(&dir)?;
        let mut out = BufWriter::new(File::create(dir.join(STATUS_FILE))?);
        serde_json::to_writer(&mut out, status).map_err(|e| StoreError::backend("failed to encode legacy status", e))?;
        out.flush()?;
        Ok(())
    }

    fn remove(&self, id: &JobId) -> Result<(), StoreError> {
        let dir = self.folder(id);
        Self::remove_file(&dir.join(STATUS_FILE))?;
        Self::remove_file(&dir.join(LOG_FILE))?;
        self.prune(&dir);
        debug!("legacy status removed id={id}");
        Ok(())
    }

    fn create_logger_tail(&self, id: Option<&JobId>, readonly: bool) -> Result<Arc<dyn LoggerTail>, StoreError> {
        match id {
            Some(id) => Ok(Arc::new(FileLoggerTail::open(self.folder(id).join(LOG_FILE), readonly)?)),
            None => Ok(Arc::new(InMemoryLoggerTail::new())),
        }
    }
}

/// Cola de logs en un archivo JSON-lines.
///
/// Las lecturas se sirven desde memoria (el archivo se lee al abrir); cada
/// `append` escribe una línea. En modo escritura el archivo se trunca al
/// abrir.
pub struct FileLoggerTail {
    path: PathBuf,
    events: RwLock<Vec<LogEvent>>,
    writer: Option<Mutex<BufWriter<File>>>,
}

impl FileLoggerTail {
    pub fn open(path: impl Into<PathBuf>, readonly: bool) -> Result<Self, StoreError> {
        let path = path.into();
        if readonly {
            let events = read_events(&path)?;
            return Ok(Self { path, events: RwLock::new(events), writer: None });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;
        Ok(Self { path, events: RwLock::new(Vec::new()), writer: Some(Mutex::new(BufWriter::new(file))) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LogEvent>> {
        self.events.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn matching(&self, min_level: Option<LogLevel>) -> Vec<LogEvent> {
        self.read().iter().filter(|e| min_level.map_or(true, |min| e.level >= min)).cloned().collect()
    }
}

fn read_events(path: &Path) -> Result<Vec<LogEvent>, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut events = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => warn!("skipping unreadable legacy log line {} in {}: {e}", n + 1, path.display()),
        }
    }
    Ok(events)
}

impl LoggerTail for FileLoggerTail {
    fn append(&self, event: LogEvent) -> Result<(), StoreError> {
        let Some(writer) = &self.writer else {
            return Err(StoreError::UnsupportedOperation("append on a read-only log tail"));
        };
        let line = serde_json::to_string(&event).map_err(|e| StoreError::backend("failed to encode log event", e))?;
        {
            let mut w = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            writeln!(w, "{line}")?;
            w.flush()?;
        }
        self.events.write().unwrap_or_else(|poisoned| poisoned.into_inner()).push(event);
        Ok(())
    }

    fn log_event(&self, index: i64) -> Result<Option<LogEvent>, StoreError> {
        Ok(usize::try_from(index).ok().and_then(|i| self.read().get(i).cloned()))
    }

    fn log_events(&self, min_level: Option<LogLevel>, offset: usize, limit: i64) -> LogEventIter<'_> {
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

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(writer) = &self.writer {
            writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).flush()?;
        }
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        self.writer.is_none()
    }
}
