//! Durable storage for a [`VectorIndex`].
//!
//! [`FileIndexStore`] keeps the index as a single JSON file inside a
//! directory. Writes go to a temporary file in the same directory which is
//! synced and renamed over the previous file, then the directory itself is
//! synced. Readers only ever observe the old index or the complete new one.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Name of the index file inside the store directory.
pub const INDEX_FILE: &str = "index.json";

/// A location that can hold one persisted [`VectorIndex`].
pub trait IndexStore: Send + Sync {
    /// Load the stored index.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet. Never returns a
    /// partially populated index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`] if a stored index exists but cannot be read.
    fn load(&self) -> Result<Option<VectorIndex>>;

    /// Persist `index`, replacing any previously stored index as a unit.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Storage`] on I/O failure; the previously stored
    /// index, if any, is left untouched.
    fn save(&self, index: &VectorIndex) -> Result<()>;

    /// Human-readable description of the location, for logs.
    fn location(&self) -> &Path;
}

/// Stores the index as `index.json` in a directory.
///
/// # Example
///
/// ```rust,ignore
/// use machi_rag::{FileIndexStore, IndexStore};
///
/// let store = FileIndexStore::new("vector_store");
/// if store.load()?.is_none() {
///     store.save(&index)?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileIndexStore {
    dir: PathBuf,
}

impl FileIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }
}

impl IndexStore for FileIndexStore {
    fn load(&self) -> Result<Option<VectorIndex>> {
        let path = self.index_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stored index");
                return Ok(None);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open stored index");
                return Err(RagError::storage(&path, format!("failed to open: {e}")));
            }
        };

        let index: VectorIndex = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to decode stored index");
            RagError::storage(&path, format!("failed to decode: {e}"))
        })?;
        index.check_integrity().map_err(|message| RagError::storage(&path, message))?;

        info!(
            path = %path.display(),
            chunk_count = index.len(),
            model = %index.manifest().embedding_model,
            "loaded vector index"
        );
        Ok(Some(index))
    }

    fn save(&self, index: &VectorIndex) -> Result<()> {
        let path = self.index_path();
        let fail = |action: &str, e: &dyn std::fmt::Display| {
            error!(path = %path.display(), error = %e, "failed to {action} index");
            RagError::storage(&path, format!("failed to {action}: {e}"))
        };

        fs::create_dir_all(&self.dir).map_err(|e| fail("create directory for", &e))?;
        let mut staged = NamedTempFile::new_in(&self.dir).map_err(|e| fail("stage", &e))?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer(&mut writer, index).map_err(|e| fail("encode", &e))?;
            writer.flush().map_err(|e| fail("write", &e))?;
        }
        staged.as_file().sync_all().map_err(|e| fail("sync", &e))?;
        staged.persist(&path).map_err(|e| fail("commit", &e.error))?;
        // The rename is durable only once the directory entry is synced.
        #[cfg(unix)]
        File::open(&self.dir).and_then(|dir| dir.sync_all()).map_err(|e| fail("sync directory of", &e))?;

        info!(path = %path.display(), chunk_count = index.len(), "saved vector index");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.dir
    }
}
