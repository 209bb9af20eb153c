//! Ejecutor transaccional.
//!
//! Corre unidades de trabajo de lectura o escritura contra el motor,
//! fijando el tenant autoritativo durante la ejecución (el estado de los
//! jobs es global, no de un tenant). El guard de `TenantContext` restaura el
//! tenant del llamador en toda salida, incluido un panic.
//!
//! Los errores del motor se devuelven como `StoreError::Backend`, con la
//! causa original preservada.

use std::sync::Arc;

use job_core::{StoreError, TenantContext};
use log::warn;

use crate::engine::{StatusSession, TransactionalEngine};
use crate::error::PersistenceError;

/// Retry simple con backoff lineal muy pequeño (hasta 3 reintentos).
///
/// Política:
/// - Reintentos: 3, sólo para errores `is_retryable`.
/// - Backoff: 15ms, 30ms, 45ms.
/// - Logs: se emite `warn!` por intento.
///
/// Garantías:
/// - No altera semántica de negocio; sólo repite la unidad de trabajo provista
///   por `f` (cada intento es una transacción nueva).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

pub struct TransactionalExecutor<E: TransactionalEngine> {
    engine: Arc<E>,
    main_tenant: Arc<str>,
}

impl<E: TransactionalEngine> Clone for TransactionalExecutor<E> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine), main_tenant: Arc::clone(&self.main_tenant) }
    }
}

impl<E: TransactionalEngine> TransactionalExecutor<E> {
    pub fn new(engine: Arc<E>, main_tenant: &str) -> Self {
        Self { engine, main_tenant: Arc::from(main_tenant) }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn main_tenant(&self) -> &str {
        &self.main_tenant
    }

    pub fn execute_read<T, F>(&self, mut work: F) -> Result<T, StoreError>
        where F: FnMut(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        let _tenant = TenantContext::enter(&self.main_tenant);
        with_retry(|| self.engine.run_read(&mut work)).map_err(StoreError::from)
    }

    pub fn execute_write<T, F>(&self, mut work: F) -> Result<T, StoreError>
        where F: FnMut(&mut dyn StatusSession) -> Result<T, PersistenceError>
    {
        let _tenant = TenantContext::enter(&self.main_tenant);
        with_retry(|| self.engine.run_write(&mut work)).map_err(StoreError::from)
    }
}
