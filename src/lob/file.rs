use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tempfile::TempPath;
use tracing::trace;

use crate::primitives::io::{EncryptedFileIo, FileIo, StorageFactory, TempFile};
use crate::types::{LobError, Result};

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`LobFile`] inside a registry.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LobFileId(pub u64);

impl fmt::Display for LobFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Temporary file backing one promoted LOB.
///
/// Offers a cursor based read/write interface over positioned [`FileIo`],
/// optionally encrypted. Closing deletes the file; every operation after
/// that fails with [`LobError::Closed`].
pub struct LobFile {
    id: LobFileId,
    path: PathBuf,
    encrypted: bool,
    state: Mutex<FileState>,
}

struct FileState {
    open: Option<OpenFile>,
    cursor: u64,
}

struct OpenFile {
    io: Box<dyn FileIo>,
    path: TempPath,
}

impl LobFile {
    /// Creates a new temporary file through `factory`, encrypting it when
    /// the factory reports an encrypted database.
    pub fn create(factory: &dyn StorageFactory, prefix: &str) -> Result<Self> {
        let TempFile { io, path } = factory.create_temporary_file(prefix)?;
        let (io, encrypted): (Box<dyn FileIo>, bool) = match factory.encryption_key() {
            Some(key) => (Box::new(EncryptedFileIo::new(io, key.clone())), true),
            None => (Box::new(io), false),
        };
        let id = LobFileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed));
        trace!(file = id.0, encrypted, path = %path.display(), "lob.file.create");
        Ok(Self {
            id,
            path: path.to_path_buf(),
            encrypted,
            state: Mutex::new(FileState {
                open: Some(OpenFile { io, path }),
                cursor: 0,
            }),
        })
    }

    /// Registry identity of this file.
    pub fn id(&self) -> LobFileId {
        self.id
    }

    /// Location of the file on disk (it may already be deleted).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the contents are encrypted on disk.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Returns true once [`LobFile::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.state.lock().open.is_none()
    }

    /// Current length of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        let state = self.state.lock();
        state.io()?.len()
    }

    /// Returns true if the file holds no bytes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current cursor position.
    pub fn position(&self) -> Result<u64> {
        let state = self.state.lock();
        state.io()?;
        Ok(state.cursor)
    }

    /// Moves the cursor. Positions past the end are allowed; a later write
    /// extends the file.
    pub fn seek(&self, pos: u64) -> Result<()> {
        let mut state = self.state.lock();
        state.io()?;
        state.cursor = pos;
        Ok(())
    }

    /// Writes `src` at the cursor and returns the advanced cursor.
    pub fn write(&self, src: &[u8]) -> Result<u64> {
        let mut state = self.state.lock();
        let cursor = state.cursor;
        state.io()?.write_at(cursor, src)?;
        state.cursor = cursor + src.len() as u64;
        Ok(state.cursor)
    }

    /// Writes one byte at the cursor and returns the advanced cursor.
    pub fn write_byte(&self, byte: u8) -> Result<u64> {
        self.write(&[byte])
    }

    /// Reads up to `dst.len()` bytes at the cursor.
    ///
    /// Returns `None` when the cursor is at or past the end of the file and
    /// a short count when fewer bytes remain than requested.
    pub fn read(&self, dst: &mut [u8]) -> Result<Option<usize>> {
        let mut state = self.state.lock();
        let cursor = state.cursor;
        let io = state.io()?;
        if dst.is_empty() {
            return Ok(Some(0));
        }
        let len = io.len()?;
        if cursor >= len {
            return Ok(None);
        }
        let count = dst.len().min((len - cursor) as usize);
        io.read_at(cursor, &mut dst[..count])?;
        state.cursor = cursor + count as u64;
        Ok(Some(count))
    }

    /// Reads one byte at the cursor, `None` at end of file.
    pub fn read_byte(&self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(self.read(&mut byte)?.map(|_| byte[0]))
    }

    /// Truncates or extends the file; a cursor past the new end is pulled
    /// back to it.
    pub fn set_length(&self, len: u64) -> Result<()> {
        let mut state = self.state.lock();
        state.io()?.truncate(len)?;
        if state.cursor > len {
            state.cursor = len;
        }
        Ok(())
    }

    /// Closes and deletes the file.
    ///
    /// Returns `true` if this call released the file and `false` if it was
    /// already closed.
    pub fn close(&self) -> Result<bool> {
        let open = self.state.lock().open.take();
        match open {
            None => Ok(false),
            Some(OpenFile { io, path }) => {
                drop(io);
                path.close().map_err(LobError::from)?;
                trace!(file = self.id.0, "lob.file.close");
                Ok(true)
            }
        }
    }
}

impl FileState {
    fn io(&self) -> Result<&dyn FileIo> {
        self.open
            .as_ref()
            .map(|open| &*open.io)
            .ok_or(LobError::Closed)
    }
}

impl fmt::Debug for LobFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobFile")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("encrypted", &self.encrypted)
            .field("closed", &self.is_closed())
            .finish()
    }
}
