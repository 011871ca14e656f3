//! Directory-backed storage with write-temp-then-rename commits.

use super::StorageBackend;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_PATH: &str = "./data/continuity";

/// Stores each document as a file under one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens at the default path `./data/continuity`.
    pub fn new() -> io::Result<Self> {
        Self::open_path(DEFAULT_PATH)
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` to a uniquely named temp file with `write`, syncs it, then
    /// renames it over the target. The temp file is removed if any step fails.
    pub(crate) fn write_atomic_with<F>(&self, name: &str, bytes: &[u8], write: F) -> io::Result<()>
    where
        F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let target = self.root.join(name);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

        let result = (|| {
            let mut file = File::create(&tmp)?;
            write(&mut file, bytes)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        })();

        if let Err(e) = &result {
            tracing::warn!(
                target: "continuity::storage",
                file = name,
                error = %e,
                "Atomic write aborted, previous file kept"
            );
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.write_atomic_with(name, bytes, |file, bytes| file.write_all(bytes))
    }
}
