//! Adaptador de blobs: guarda, carga y borra el payload serializado de un
//! `JobStatus` en un `BlobStore`.
//!
//! El codec (gzip o crudo) se elige por el sufijo del locator. El handle del
//! blob store se resuelve una sola vez al inicializar; si no se puede
//! resolver, el arranque falla con `StoreError::Initialization`.

mod file;

pub use file::FileBlobStore;

use std::sync::Arc;

use job_core::constants::{ARCHIVE_SUFFIX, STATUS_BLOB_COMPRESSED, STATUS_BLOB_RAW};
use job_core::{BlobStore, JobStatus, StatusSerializer, StoreError};
use log::{debug, error};

/// Locator del payload de estado para una clave de blob.
pub fn locator_for(blob_key: &str, compressed: bool) -> String {
    let file = if compressed { STATUS_BLOB_COMPRESSED } else { STATUS_BLOB_RAW };
    format!("/{blob_key}/{file}")
}

pub fn is_compressed(locator: &str) -> bool {
    locator.ends_with(ARCHIVE_SUFFIX)
}

#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    serializer: Arc<dyn StatusSerializer>,
}

impl BlobAdapter {
    /// Resuelve el blob store con `resolve` y lo deja cacheado.
    pub fn initialize<F, B>(resolve: F, serializer: Arc<dyn StatusSerializer>) -> Result<Self, StoreError>
        where F: FnOnce() -> Result<B, StoreError>,
              B: BlobStore + 'static
    {
        let store = resolve().map_err(|e| match e {
                                  e @ StoreError::Initialization { .. } => e,
                                  other => StoreError::initialization_caused_by("cannot resolve blob store", other),
                              })?;
        Ok(Self::new(Arc::new(store), serializer))
    }

    pub fn new(store: Arc<dyn BlobStore>, serializer: Arc<dyn StatusSerializer>) -> Self {
        Self { store, serializer }
    }

    pub fn store(&self, status: &JobStatus, locator: &str) -> Result<(), StoreError> {
        let blob = self.store.get_blob(locator)?;
        let mut out = blob.open_for_write(true)?;
        self.serializer.write(status, &mut out, is_compressed(locator))?;
        debug!("blob stored locator={locator}");
        Ok(())
    }

    /// Carga el payload. `Ok(None)` si el blob no existe.
    pub fn load(&self, locator: &str) -> Result<Option<JobStatus>, StoreError> {
        let blob = self.store.get_blob(locator)?;
        if !blob.exists()? {
            return Ok(None);
        }
        let mut input = blob.open_for_read()?;
        let status = self.serializer
                         .read(&mut input, is_compressed(locator))
                         .map_err(|e| StoreError::backend(format!("cannot read job status blob {locator}"), e))?;
        Ok(Some(status))
    }

    /// Borrado best-effort: los fallos se registran y se ignoran.
    pub fn delete(&self, locator: &str) {
        if let Err(e) = self.store.get_blob(locator).and_then(|blob| blob.delete()) {
            error!("failed to delete job status blob {locator}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use job_core::{JobId, JobRequest};

    use super::*;
    use crate::serializer::JsonStatusSerializer;

    fn adapter(root: &std::path::Path) -> BlobAdapter {
        let root = root.to_path_buf();
        BlobAdapter::initialize(move || FileBlobStore::open(root), Arc::new(JsonStatusSerializer)).unwrap()
    }

    #[test]
    fn locators() {
        assert_eq!(locator_for("wiki/42", true), "/wiki/42/status.xml.zip");
        assert_eq!(locator_for("wiki/42", false), "/wiki/42/status.xml");
        assert!(is_compressed("/a/status.xml.zip"));
        assert!(!is_compressed("/a/status.xml"));
    }

    #[test]
    fn store_load_delete_both_codecs() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = adapter(dir.path());
        let status = JobStatus::new("export", JobRequest::new(Some(JobId::new(["wiki", "export"]))));
        for compressed in [true, false] {
            let locator = locator_for("wiki/export", compressed);
            blobs.store(&status, &locator).unwrap();
            let back = blobs.load(&locator).unwrap().unwrap();
            assert_eq!(back.job_type, "export");
            blobs.delete(&locator);
            assert!(blobs.load(&locator).unwrap().is_none());
        }
    }

    #[test]
    fn long_id_locators_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = adapter(dir.path());
        let normalizer = job_core::IdNormalizer::default();
        let ids = [JobId::new(["s".repeat(5_000)]), JobId::new(["a".repeat(127), "b".repeat(255), "c".repeat(200)])];
        for id in ids {
            let locator = locator_for(&normalizer.blob_key(Some(&id)), true);
            let status = JobStatus::new("long", JobRequest::new(Some(id.clone())));
            blobs.store(&status, &locator).unwrap();
            assert_eq!(blobs.load(&locator).unwrap().unwrap().id(), Some(&id));
        }
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = adapter(dir.path());
        let locator = locator_for("bad", true);
        std::fs::create_dir_all(dir.path().join("bad")).unwrap();
        std::fs::write(dir.path().join("bad/status.xml.zip"), b"not gzip").unwrap();
        assert!(matches!(blobs.load(&locator), Err(StoreError::Backend { .. })));
    }

    #[test]
    fn unresolvable_store_fails_initialization() {
        let err = BlobAdapter::initialize(|| -> Result<FileBlobStore, StoreError> {
                                              Err(StoreError::backend("no backend", std::io::Error::other("down")))
                                          },
                                          Arc::new(JsonStatusSerializer)).err()
                                                                         .unwrap();
        assert!(matches!(err, StoreError::Initialization { .. }));
    }
}
