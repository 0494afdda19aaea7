use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::eid::Eid;

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> std::io::Result<()>;
    fn list(&self) -> Vec<String>;
}

/// Files under a directory. Writes go through a temp file and a rename.
#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }

    fn path(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.path(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let temp_path = self.path(&format!("{}-{ident}", Eid::new()));

        std::fs::write(&temp_path, data)?;

        std::fs::rename(&temp_path, self.path(ident))
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path(ident))
    }

    fn list(&self) -> Vec<String> {
        std::fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Session-scoped blobs (thumbnails). Gone when the process exits.
#[derive(Default)]
pub struct BackendMemory {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl BackendMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "storage lock poisoned")
}

impl StorageManager for BackendMemory {
    fn exists(&self, ident: &str) -> bool {
        self.blobs
            .read()
            .map(|blobs| blobs.contains_key(ident))
            .unwrap_or(false)
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        self.blobs
            .read()
            .map_err(|_| poisoned())?
            .get(ident)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, ident.to_string()))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        self.blobs
            .write()
            .map_err(|_| poisoned())?
            .insert(ident.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        self.blobs
            .write()
            .map_err(|_| poisoned())?
            .remove(ident)
            .map(|_| ())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, ident.to_string()))
    }

    fn list(&self) -> Vec<String> {
        self.blobs
            .read()
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }
}
