//! Storage backends and whole-document persistence for the four stores.
//!
//! | File                    | Store          |
//! |-------------------------|----------------|
//! | `state_checkpoint.json` | Fact Store + mood |
//! | `episode_log.json`      | Episode Log    |
//! | `goal_stack.json`       | Goal Stack     |
//! | `identity_model.json`   | Identity Model |
//!
//! Each document is loaded fully at startup and rewritten fully on save. Writes go
//! through [`StorageBackend::write_atomic`], so a reader only ever sees the previous
//! document or the complete new one.

mod file;

pub use file::FileStorage;

use crate::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Where store documents live. Names are flat file names such as `goal_stack.json`.
pub trait StorageBackend: Send + Sync {
    /// Returns `Ok(None)` when the document has never been written.
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Replaces the document in one step; on error the previous content is untouched.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// A persisted JSON document belonging to one store.
pub trait StoreDocument: Serialize + DeserializeOwned + Default {
    /// File name inside the storage backend.
    const FILE_NAME: &'static str;
    /// Short store name used in logs and errors.
    const STORE: &'static str;

    /// Checks invariants that the JSON shape alone cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// How a document came back from storage.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Document read and validated.
    Restored,
    /// Nothing stored yet.
    Missing,
    /// Unreadable, malformed or invalid; the store starts empty.
    Recovered(PersistenceError),
}

/// Loads a document, falling back to an empty store on any failure.
///
/// A failure here never propagates: the caller gets `T::default()` and the error
/// inside [`LoadOutcome::Recovered`] so it can be surfaced as a warning.
pub fn load_document<T: StoreDocument>(backend: &dyn StorageBackend) -> (T, LoadOutcome) {
    let bytes = match backend.read(T::FILE_NAME) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::info!(target: "continuity::storage", store = T::STORE, "No saved state, starting empty");
            return (T::default(), LoadOutcome::Missing);
        }
        Err(source) => {
            return recovered(PersistenceError::Io {
                store: T::STORE,
                source,
            })
        }
    };

    let doc: T = match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(source) => {
            return recovered(PersistenceError::Json {
                store: T::STORE,
                source,
            })
        }
    };

    if let Err(reason) = doc.validate() {
        return recovered(PersistenceError::Invalid {
            store: T::STORE,
            reason,
        });
    }

    tracing::debug!(target: "continuity::storage", store = T::STORE, bytes = bytes.len(), "Store restored");
    (doc, LoadOutcome::Restored)
}

fn recovered<T: StoreDocument>(err: PersistenceError) -> (T, LoadOutcome) {
    tracing::warn!(
        target: "continuity::storage",
        store = T::STORE,
        error = %err,
        "Store unreadable, initializing empty"
    );
    (T::default(), LoadOutcome::Recovered(err))
}

/// Serializes and atomically writes a document.
pub fn save_document<T: StoreDocument>(
    backend: &dyn StorageBackend,
    doc: &T,
) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(doc).map_err(|source| PersistenceError::Json {
        store: T::STORE,
        source,
    })?;
    backend
        .write_atomic(T::FILE_NAME, &bytes)
        .map_err(|source| PersistenceError::Io {
            store: T::STORE,
            source,
        })?;
    tracing::debug!(target: "continuity::storage", store = T::STORE, bytes = bytes.len(), "Store saved");
    Ok(())
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    docs: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_on: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails and leaves the stored bytes untouched.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// While set, writes to this one document fail.
    pub fn set_fail_on(&self, name: Option<&str>) {
        let mut fail_on = self.fail_on.lock().unwrap_or_else(|p| p.into_inner());
        *fail_on = name.map(str::to_string);
    }

    /// Stores raw bytes, bypassing serialization (used to plant corrupt documents).
    pub fn put_raw(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        let mut docs = self.docs.lock().unwrap_or_else(|p| p.into_inner());
        docs.insert(name.to_string(), bytes.into());
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        let docs = self.docs.lock().unwrap_or_else(|p| p.into_inner());
        Ok(docs.get(name).cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let targeted = self
            .fail_on
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_deref()
            == Some(name);
        if targeted || self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.put_raw(name, bytes);
        Ok(())
    }
}
