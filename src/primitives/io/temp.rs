#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::trace;

use super::{EncryptionKey, StdFileIo};
use crate::types::{LobError, Result};

/// Freshly created temporary file: an open handle plus the path guard that
/// deletes it.
pub struct TempFile {
    /// Open read-write handle.
    pub io: StdFileIo,
    /// Path guard; [`TempPath::close`] removes the file.
    pub path: TempPath,
}

/// Storage-layer factory used when a LOB spills to disk.
pub trait StorageFactory: Send + Sync + 'static {
    /// Creates a new, empty, uniquely named temporary file.
    fn create_temporary_file(&self, prefix: &str) -> Result<TempFile>;

    /// Key used to encrypt temporary files, when the database is encrypted.
    fn encryption_key(&self) -> Option<&EncryptionKey>;

    /// Returns true if temporary files must be encrypted.
    fn database_encrypted(&self) -> bool {
        self.encryption_key().is_some()
    }
}

/// [`StorageFactory`] creating temporary files inside one directory.
#[derive(Debug, Clone)]
pub struct TempDirStorage {
    dir: PathBuf,
    key: Option<EncryptionKey>,
}

impl TempDirStorage {
    /// Creates a factory for plain temporary files inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key: None,
        }
    }

    /// Creates a factory whose temporary files are encrypted with `key`.
    pub fn encrypted(dir: impl Into<PathBuf>, key: EncryptionKey) -> Self {
        Self {
            dir: dir.into(),
            key: Some(key),
        }
    }

    /// Directory that receives the temporary files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StorageFactory for TempDirStorage {
    fn create_temporary_file(&self, prefix: &str) -> Result<TempFile> {
        let named = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(LobError::from)?;
        let (file, path) = named.into_parts();
        trace!(path = %path.display(), "io.temp.create");
        Ok(TempFile {
            io: StdFileIo::new(file),
            path,
        })
    }

    fn encryption_key(&self) -> Option<&EncryptionKey> {
        self.key.as_ref()
    }
}
