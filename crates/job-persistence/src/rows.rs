//! Filas de las tablas `job_status_summary` y `job_status_log_entry`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use crate::schema::{job_status_log_entry, job_status_summary};

/// Resumen de un estado: una fila por (node_id, status_key). Es la fuente de
/// verdad de "existe el estado en el backend nuevo".
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = job_status_summary)]
#[diesel(primary_key(node_id, status_key))]
#[diesel(treat_none_as_null = true)]
pub struct SummaryRow {
    pub node_id: String,
    pub status_key: String,
    pub full_job_id: String,
    pub job_type: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub serialized: bool,
    pub isolated: bool,
    pub cancelable: bool,
    pub canceled: bool,
    pub blob_locator: Option<String>,
}

/// Una línea de log.
///
/// - `level`: ordinal de severidad (`LogLevel::ordinal`).
/// - `message` / `formatted_message` / `throwable_*`: truncados al tope de
///   la columna con marca `...`.
/// - `payload`: JSON completo del `LogEvent` para reconstrucción exacta.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = job_status_log_entry)]
pub struct LogEntryRow {
    pub node_id: String,
    pub status_key: String,
    pub line_index: i64,
    pub level: i32,
    pub ts: DateTime<Utc>,
    pub message: String,
    pub formatted_message: String,
    pub throwable_type: Option<String>,
    pub throwable_message: Option<String>,
    pub payload: Value,
}
