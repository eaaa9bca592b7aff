//! Index of files the server is willing to send.
//!
//! The catalog is built once at startup by scanning a directory: every
//! regular file directly inside it is registered under its file name together
//! with its size at scan time.  Requests are answered from this index only,
//! so a request can never reach a path outside the scanned directory.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// One servable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Byte length recorded when the catalog was scanned.
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("file {0:?} is not in the catalog")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Name → file index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    files: HashMap<String, FileEntry>,
}

impl Catalog {
    /// Register every regular file directly inside `dir`.
    ///
    /// Subdirectories and names that are not valid UTF-8 are skipped.
    pub fn scan(dir: &Path) -> Result<Self, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = HashMap::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let meta = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("[catalog] skipping {}: {e}", entry.path().display());
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                log::debug!("[catalog] skipping non-UTF-8 name {:?}", entry.file_name());
                continue;
            };
            files.insert(
                name,
                FileEntry {
                    path: entry.path(),
                    size: meta.len(),
                },
            );
        }
        log::info!("[catalog] {} file(s) indexed from {}", files.len(), dir.display());
        Ok(Self { files })
    }

    /// Register a single file by name.  Mostly useful for tests and embedding.
    pub fn insert(&mut self, name: impl Into<String>, entry: FileEntry) {
        self.files.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    /// Recorded size of `name`, if known.
    pub fn size(&self, name: &str) -> Option<u64> {
        self.get(name).map(|e| e.size)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read the full contents of `name`.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, CatalogError> {
        let entry = self
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        tokio::fs::read(&entry.path)
            .await
            .map_err(|source| CatalogError::Io {
                path: entry.path.clone(),
                source,
            })
    }
}
