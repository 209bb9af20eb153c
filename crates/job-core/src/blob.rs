//! Capacidades externas: blob store direccionado por ruta y serializador de
//! estados.

use std::io::{Read, Write};

use crate::errors::StoreError;
use crate::model::JobStatus;

/// Almacén de bytes direccionado por ruta (`/a/b/status.xml.zip`).
pub trait BlobStore: Send + Sync {
    fn get_blob(&self, path: &str) -> Result<Box<dyn Blob>, StoreError>;
}

pub trait Blob {
    fn path(&self) -> &str;

    fn exists(&self) -> Result<bool, StoreError>;

    /// Abre para escritura. Con `replace == false` falla si ya existe.
    fn open_for_write(&self, replace: bool) -> Result<Box<dyn Write + Send>, StoreError>;

    fn open_for_read(&self) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Borra el blob. Borrar un blob inexistente no es error.
    fn delete(&self) -> Result<(), StoreError>;
}

/// Serialización opaca de un `JobStatus` (payload completo: petición,
/// resultado, flags).
pub trait StatusSerializer: Send + Sync {
    fn write(&self, status: &JobStatus, out: &mut dyn Write, compressed: bool) -> Result<(), StoreError>;

    fn read(&self, input: &mut dyn Read, compressed: bool) -> Result<JobStatus, StoreError>;
}
