//! Implementación Postgres (Diesel) del motor transaccional.
//!
//! Objetivo general del módulo:
//! - Proveer el backend durable del resumen de estados y de las líneas de
//!   log, con paridad 1:1 respecto al motor en memoria.
//! - Aislar completamente el mapeo filas ↔ Diesel del resto del store.
//!
//! Notas:
//! - Cada unidad de trabajo corre en `build_transaction().read_only()` o
//!   `.read_write()`; cualquier `Err` revierte la transacción completa.
//! - `lock_summary` usa `SELECT ... FOR UPDATE`: serializa escritores de la
//!   misma (node_id, status_key) hasta el commit.
//! - El pool se construye con migraciones embebidas ya aplicadas.

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};

use super::{Edge, StatusSession, TransactionalEngine};
use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::rows::{LogEntryRow, SummaryRow};
use crate::schema::{job_status_log_entry, job_status_summary};

/// Pool r2d2 de conexiones Postgres; `build_pool` lo entrega migrado.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Origen de las conexiones del motor. Cada unidad de trabajo pide una y la
/// devuelve al terminar; un fallo al obtenerla es `TransientIo` y el
/// ejecutor lo reintenta.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("job store connection: {e}")))
    }
}

/// Motor transaccional sobre Postgres.
pub struct PgEngine<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgEngine<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> TransactionalEngine for PgEngine<P> {
    fn run_read<T, F>(&self, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        let mut conn = self.provider.connection()?;
        conn.build_transaction()
            .read_only()
            .run(|tx_conn| work(&mut PgSession { conn: tx_conn }))
    }

    fn run_write<T, F>(&self, work: F) -> Result<T, PersistenceError>
        where F: FnOnce(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        let mut conn = self.provider.connection()?;
        conn.build_transaction()
            .read_write()
            .run(|tx_conn| work(&mut PgSession { conn: tx_conn }))
    }
}

struct PgSession<'c> {
    conn: &'c mut PgConnection,
}

/// Consulta base de líneas de log de una cola, con filtro de nivel opcional.
fn log_query<'a>(node_id: &'a str,
                 status_key: &'a str,
                 min_level: Option<i32>)
                 -> job_status_log_entry::BoxedQuery<'a, Pg> {
    let mut query = job_status_log_entry::table.filter(job_status_log_entry::node_id.eq(node_id))
                                               .filter(job_status_log_entry::status_key.eq(status_key))
                                               .into_boxed();
    if let Some(level) = min_level {
        query = query.filter(job_status_log_entry::level.ge(level));
    }
    query
}

impl StatusSession for PgSession<'_> {
    fn find_summary(&mut self, node_id: &str, status_key: &str) -> Result<Option<SummaryRow>, PersistenceError> {
        let conn = &mut *self.conn;
        job_status_summary::table.find((node_id, status_key))
                                 .select(SummaryRow::as_select())
                                 .first(conn)
                                 .optional()
                                 .map_err(PersistenceError::from)
    }

    fn lock_summary(&mut self, node_id: &str, status_key: &str) -> Result<Option<SummaryRow>, PersistenceError> {
        let conn = &mut *self.conn;
        job_status_summary::table.find((node_id, status_key))
                                 .select(SummaryRow::as_select())
                                 .for_update()
                                 .first(conn)
                                 .optional()
                                 .map_err(PersistenceError::from)
    }

    fn insert_summary(&mut self, row: &SummaryRow) -> Result<(), PersistenceError> {
        let conn = &mut *self.conn;
        // `FOR UPDATE` no bloquea una fila inexistente: dos primeros saves
        // concurrentes pueden llegar aquí; el segundo pasa a update.
        diesel::insert_into(job_status_summary::table).values(row)
                                                      .on_conflict((job_status_summary::node_id,
                                                                    job_status_summary::status_key))
                                                      .do_update()
                                                      .set(row)
                                                      .execute(conn)?;
        Ok(())
    }

    fn update_summary(&mut self, row: &SummaryRow) -> Result<(), PersistenceError> {
        let conn = &mut *self.conn;
        let target = job_status_summary::table.find((row.node_id.as_str(), row.status_key.as_str()));
        let updated = diesel::update(target).set(row).execute(conn)?;
        if updated == 0 {
            warn!("update_summary: no row for node={} key={}", row.node_id, row.status_key);
        }
        Ok(())
    }

    fn delete_summary(&mut self, node_id: &str, status_key: &str) -> Result<usize, PersistenceError> {
        let conn = &mut *self.conn;
        Ok(diesel::delete(job_status_summary::table.find((node_id, status_key))).execute(conn)?)
    }

    fn list_summaries(&mut self, node_id: &str, limit: i64) -> Result<Vec<SummaryRow>, PersistenceError> {
        let conn = &mut *self.conn;
        job_status_summary::table.filter(job_status_summary::node_id.eq(node_id))
                                 .order(job_status_summary::status_key.asc())
                                 .limit(limit)
                                 .select(SummaryRow::as_select())
                                 .load(conn)
                                 .map_err(PersistenceError::from)
    }

    fn insert_log_entry(&mut self, row: &LogEntryRow) -> Result<(), PersistenceError> {
        let conn = &mut *self.conn;
        diesel::insert_into(job_status_log_entry::table).values(row).execute(conn)?;
        Ok(())
    }

    fn delete_log_entries(&mut self, node_id: &str, status_key: &str) -> Result<usize, PersistenceError> {
        let conn = &mut *self.conn;
        let deleted = diesel::delete(job_status_log_entry::table.filter(job_status_log_entry::node_id.eq(node_id))
                                                                .filter(job_status_log_entry::status_key.eq(status_key)))
                          .execute(conn)?;
        debug!("delete_log_entries node={node_id} key={status_key} deleted={deleted}");
        Ok(deleted)
    }

    fn find_log_entry(&mut self, node_id: &str, status_key: &str, line_index: i64)
                      -> Result<Option<LogEntryRow>, PersistenceError> {
        let conn = &mut *self.conn;
        job_status_log_entry::table.find((node_id, status_key, line_index))
                                   .select(LogEntryRow::as_select())
                                   .first(conn)
                                   .optional()
                                   .map_err(PersistenceError::from)
    }

    fn log_entries_after(&mut self,
                         node_id: &str,
                         status_key: &str,
                         min_level: Option<i32>,
                         after: Option<i64>,
                         limit: i64)
                         -> Result<Vec<LogEntryRow>, PersistenceError> {
        let conn = &mut *self.conn;
        let mut query = log_query(node_id, status_key, min_level);
        if let Some(after) = after {
            query = query.filter(job_status_log_entry::line_index.gt(after));
        }
        query.order(job_status_log_entry::line_index.asc())
             .limit(limit)
             .select(LogEntryRow::as_select())
             .load(conn)
             .map_err(PersistenceError::from)
    }

    fn edge_log_entry(&mut self,
                      node_id: &str,
                      status_key: &str,
                      min_level: Option<i32>,
                      edge: Edge)
                      -> Result<Option<LogEntryRow>, PersistenceError> {
        let conn = &mut *self.conn;
        let query = log_query(node_id, status_key, min_level);
        let query = match edge {
            Edge::First => query.order(job_status_log_entry::line_index.asc()),
            Edge::Last => query.order(job_status_log_entry::line_index.desc()),
        };
        query.select(LogEntryRow::as_select())
             .first(conn)
             .optional()
             .map_err(PersistenceError::from)
    }

    fn count_log_entries(&mut self, node_id: &str, status_key: &str, min_level: Option<i32>)
                         -> Result<i64, PersistenceError> {
        let conn = &mut *self.conn;
        log_query(node_id, status_key, min_level).count()
                                                 .get_result(conn)
                                                 .map_err(PersistenceError::from)
    }
}

/// Pool de conexiones del store de estados, con el esquema ya migrado.
///
/// Tamaños en cero cuentan como uno y `min_size` nunca supera `max_size`.
/// Si la base no responde o una migración falla, el error se propaga y el
/// store no arranca.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max_size = max_size.max(1);
    let min_size = min_size.max(1);
    if min_size > max_size {
        warn!("job store pool: min_size {min_size} > max_size {max_size}, using {max_size}");
    }
    let pool = r2d2::Pool::builder().min_idle(Some(min_size.min(max_size)))
                                    .max_size(max_size)
                                    .build(ConnectionManager::<PgConnection>::new(database_url))
                                    .map_err(|e| PersistenceError::TransientIo(format!("job store pool: {e}")))?;
    let mut conn = pool.get()
                       .map_err(|e| PersistenceError::TransientIo(format!("job store schema checkout: {e}")))?;
    run_pending_migrations(&mut conn)?;
    debug!("job store pool ready max_size={max_size}");
    drop(conn);
    Ok(pool)
}

/// Construye el pool con los tamaños de `DbConfig`.
pub fn build_pool_from_config(cfg: &DbConfig) -> Result<PgPool, PersistenceError> {
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
