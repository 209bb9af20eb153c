//! Modelo de dominio: identificadores, estados de jobs y eventos de log.

pub mod id;
pub mod log;
pub mod status;

pub use id::JobId;
pub use log::{truncate_with_marker, LogEvent, LogLevel, ThrowableInfo};
pub use status::{JobRequest, JobState, JobStatus};
