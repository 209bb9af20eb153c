//! Contexto de ejecución por hilo: tenant actual.
//!
//! El estado de los jobs es global (no pertenece a un tenant), así que los
//! accesos a la base se fijan a un tenant autoritativo y luego se restaura el
//! tenant que tenía el llamador. `TenantContext::enter` devuelve un guard que
//! restaura el valor previo al soltarse, también durante un panic.

use std::cell::RefCell;

thread_local! {
    static CURRENT_TENANT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Tenant actual del hilo (None si nadie lo fijó).
pub fn current_tenant() -> Option<String> {
    CURRENT_TENANT.with(|t| t.borrow().clone())
}

/// Guard de cambio de tenant. Al soltarse restaura el tenant previo.
#[must_use = "el tenant se restaura al soltar el guard"]
pub struct TenantContext {
    previous: Option<String>,
}

impl TenantContext {
    /// Fija `tenant` como tenant actual hasta que el guard se suelte.
    pub fn enter(tenant: &str) -> Self {
        let previous = CURRENT_TENANT.with(|t| t.replace(Some(tenant.to_string())));
        Self { previous }
    }
}

impl Drop for TenantContext {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_TENANT.with(|t| {
            *t.borrow_mut() = previous;
        });
    }
}
