//! Errores del backend relacional del store de estados.
//!
//! `PersistenceError` es lo que devuelve una unidad de trabajo; el ejecutor
//! lo convierte en `StoreError` al salir. Un fallo del blob store dentro de
//! la transacción viaja como `Blob` y sale intacto, sin re-envolver.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use job_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Dos resúmenes o dos líneas de log con la misma clave.
    #[error("duplicate job status row: {0}")]
    UniqueViolation(String),
    /// Fila rechazada por el esquema (por ejemplo `line_index` negativo).
    #[error("job status row rejected by schema: {0}")]
    CheckViolation(String),
    #[error("row not found")]
    NotFound,
    /// Conflicto entre escritores concurrentes; la unidad se puede repetir.
    #[error("concurrent update conflict (retryable)")]
    SerializationConflict,
    #[error("database connection unavailable: {0}")]
    TransientIo(String),
    #[error("job status blob failure")]
    Blob(#[source] StoreError),
    #[error("job status database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::UniqueViolation(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info)
            | DieselError::DatabaseError(DatabaseErrorKind::NotNullViolation, info) => {
                Self::CheckViolation(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => Self::SerializationConflict,
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                Self::TransientIo(info.message().to_string())
            }
            DieselError::BrokenTransactionManager => Self::TransientIo("transaction manager left broken".into()),
            DieselError::DatabaseError(kind, info) => Self::Unknown(format!("{kind:?}: {}", info.message())),
            DieselError::DeserializationError(e) => Self::Unknown(format!("cannot decode job status row: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("cannot encode job status row: {e}")),
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl PersistenceError {
    /// Indica si la unidad de trabajo puede repetirse en una transacción
    /// nueva. Además de las variantes transitorias reconoce, por texto, los
    /// deadlocks y cortes de conexión que Postgres no clasifica.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SerializationConflict | Self::TransientIo(_) => true,
            Self::Unknown(msg) => {
                let m = msg.to_lowercase();
                ["deadlock detected", "could not serialize access", "connection closed", "timeout"].iter()
                                                                                                  .any(|p| m.contains(p))
            }
            _ => false,
        }
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Blob(inner) => inner,
            other => StoreError::backend(format!("job status database failure: {other}"), other),
        }
    }
}
