//! Estado de un job de larga duración.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JobId;
use crate::tail::{InMemoryLoggerTail, LoggerTail};

/// Estado del ciclo de vida de un job. Se persiste por nombre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    #[default]
    None,
    Running,
    Waiting,
    Finished,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "RUNNING" => Ok(Self::Running),
            "WAITING" => Ok(Self::Waiting),
            "FINISHED" => Ok(Self::Finished),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// Petición que originó el job: id jerárquico + parámetros opacos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: Option<JobId>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl JobRequest {
    pub fn new(id: Option<JobId>) -> Self {
        Self { id, properties: BTreeMap::new() }
    }
}

fn detached_tail() -> Arc<dyn LoggerTail> {
    Arc::new(InMemoryLoggerTail::new())
}

/// Registro durable de un job: tipo, estado, tiempos, flags y resultado.
///
/// La cola de logs no forma parte del payload serializado; el store adjunta
/// la cola correcta (memoria, legacy o relacional) al cargar.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_type: String,
    pub request: JobRequest,
    #[serde(default)]
    pub state: JobState,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// `false` marca un estado que no debe persistirse.
    #[serde(default = "default_true")]
    pub serialized: bool,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub cancelable: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(skip, default = "detached_tail")]
    log_tail: Arc<dyn LoggerTail>,
}

fn default_true() -> bool {
    true
}

impl JobStatus {
    pub fn new(job_type: impl Into<String>, request: JobRequest) -> Self {
        Self { job_type: job_type.into(),
               request,
               state: JobState::None,
               start_date: None,
               end_date: None,
               serialized: true,
               isolated: false,
               cancelable: false,
               canceled: false,
               error: None,
               result: None,
               log_tail: detached_tail() }
    }

    pub fn id(&self) -> Option<&JobId> {
        self.request.id.as_ref()
    }

    pub fn log_tail(&self) -> &Arc<dyn LoggerTail> {
        &self.log_tail
    }

    /// Reemplaza la cola de logs (redirige lecturas/escrituras a otro backend).
    pub fn set_log_tail(&mut self, tail: Arc<dyn LoggerTail>) {
        self.log_tail = tail;
    }

    pub fn start(&mut self) {
        self.state = JobState::Running;
        self.start_date = Some(Utc::now());
    }

    pub fn finish(&mut self, result: Option<Value>) {
        self.state = JobState::Finished;
        self.end_date = Some(Utc::now());
        self.result = result;
    }
}

impl fmt::Debug for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStatus")
         .field("job_type", &self.job_type)
         .field("request", &self.request)
         .field("state", &self.state)
         .field("start_date", &self.start_date)
         .field("end_date", &self.end_date)
         .field("serialized", &self.serialized)
         .field("isolated", &self.isolated)
         .field("cancelable", &self.cancelable)
         .field("canceled", &self.canceled)
         .field("error", &self.error)
         .field("log_tail", &self.log_tail.storage_key())
         .finish_non_exhaustive()
    }
}
