//! Carga de configuración desde variables de entorno (.env incluido).
//!
//! - `DbConfig`: conexión Postgres (`DATABASE_URL` + tamaños de pool).
//! - `StoreConfig`: identidad de nodo, tenant autoritativo y rutas de los
//!   stores de blobs y legacy.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use job_core::StoreError;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, StoreError> {
        init_dotenv();
        let url = env::var("DATABASE_URL").map_err(|_| StoreError::initialization("DATABASE_URL no definido"))?;
        Ok(Self { url,
                  min_connections: var_or("DATABASE_MIN_CONNECTIONS", 2),
                  max_connections: var_or("DATABASE_MAX_CONNECTIONS", 16) })
    }
}

/// Parámetros del store de estados.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Nodo dueño de las escrituras (parte de la clave de cada fila).
    pub node_id: String,
    /// Tenant al que se fija todo acceso a la base.
    pub main_tenant: String,
    pub blob_root: PathBuf,
    pub legacy_root: PathBuf,
    /// Blobs `status.xml.zip` (gzip) en lugar de `status.xml`.
    pub compress_blobs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { node_id: "local".into(),
               main_tenant: "main".into(),
               blob_root: PathBuf::from("data/blobs"),
               legacy_root: PathBuf::from("data/jobs/status"),
               compress_blobs: true }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        init_dotenv();
        let defaults = Self::default();
        let node_id = env::var("JOBSTORE_NODE_ID").or_else(|_| env::var("HOSTNAME"))
                                                  .ok()
                                                  .filter(|v| !v.trim().is_empty())
                                                  .unwrap_or(defaults.node_id);
        Self { node_id,
               main_tenant: env::var("JOBSTORE_MAIN_TENANT").unwrap_or(defaults.main_tenant),
               blob_root: env::var("JOBSTORE_BLOB_ROOT").map(PathBuf::from).unwrap_or(defaults.blob_root),
               legacy_root: env::var("JOBSTORE_LEGACY_ROOT").map(PathBuf::from).unwrap_or(defaults.legacy_root),
               compress_blobs: var_or("JOBSTORE_COMPRESS_BLOBS", defaults.compress_blobs) }
    }
}
