//! Blob store sobre un directorio local: el locator `/a/b/status.xml.zip` se
//! guarda en `<root>/a/b/status.xml.zip`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use job_core::{Blob, BlobStore, StoreError};
use log::debug;

#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Abre (y crea si falta) el directorio raíz.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
                                      StoreError::initialization_caused_by(format!("cannot open blob store at {}",
                                                                                   root.display()),
                                                                           e)
                                  })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for FileBlobStore {
    fn get_blob(&self, path: &str) -> Result<Box<dyn Blob>, StoreError> {
        let mut file = self.root.clone();
        for part in Path::new(path.trim_start_matches('/')).components() {
            match part {
                Component::Normal(p) => file.push(p),
                _ => {
                    return Err(StoreError::backend(format!("invalid blob path: {path}"),
                                                   io::Error::from(io::ErrorKind::InvalidInput)))
                }
            }
        }
        Ok(Box::new(FileBlob { path: path.to_string(), file, root: self.root.clone() }))
    }
}

struct FileBlob {
    path: String,
    file: PathBuf,
    root: PathBuf,
}

impl FileBlob {
    /// Borra directorios vacíos entre el blob y la raíz.
    fn prune_empty_parents(&self) {
        let mut dir = self.file.parent();
        while let Some(d) = dir {
            if d == self.root.as_path() || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

impl Blob for FileBlob {
    fn path(&self) -> &str {
        &self.path
    }

    fn exists(&self) -> Result<bool, StoreError> {
        Ok(self.file.is_file())
    }

    fn open_for_write(&self, replace: bool) -> Result<Box<dyn Write + Send>, StoreError> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.write(true);
        if replace {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options.open(&self.file)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn open_for_read(&self) -> Result<Box<dyn Read + Send>, StoreError> {
        Ok(Box::new(BufReader::new(File::open(&self.file)?)))
    }

    fn delete(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.file) {
            Ok(()) => {
                debug!("blob deleted path={}", self.path);
                self.prune_empty_parents();
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
