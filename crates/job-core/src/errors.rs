//! Errores del almacén de estados de jobs.
//!
//! Taxonomía:
//! - `Initialization`: fatal, sólo al arrancar (blob store o motor relacional
//!   no resolubles).
//! - `Backend`: fallo recuperable de una llamada (motor transaccional, blob
//!   store, serialización). Siempre conserva la causa original.
//! - `Job`: envoltorio que adjunta el id del job a otro `StoreError`.
//! - `UnsupportedOperation`: error de programación (escritura sobre una cola
//!   de logs de sólo lectura).
//!
//! "No encontrado" nunca es un error: las operaciones devuelven `Option`.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("initialization failed: {message}")]
    Initialization {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BoxError,
    },
    #[error("job status store failure for job [{job_id}]")]
    Job {
        job_id: String,
        #[source]
        source: Box<StoreError>,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl StoreError {
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization { message: message.into(), source: None }
    }

    pub fn initialization_caused_by(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Initialization { message: message.into(), source: Some(source.into()) }
    }

    pub fn backend(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend { message: message.into(), source: source.into() }
    }

    /// Adjunta el id del job. No anida dos veces el mismo envoltorio.
    pub fn for_job(self, job_id: impl Into<String>) -> Self {
        match self {
            Self::Job { .. } => self,
            other => Self::Job { job_id: job_id.into(), source: Box::new(other) },
        }
    }

    /// Error raíz (descarta los envoltorios `Job`).
    pub fn root(&self) -> &StoreError {
        match self {
            Self::Job { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.root(), Self::UnsupportedOperation(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::backend(format!("io: {err}"), err)
    }
}
