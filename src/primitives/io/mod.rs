#![forbid(unsafe_code)]

use std::{
    fs::File,
    io::{self, ErrorKind},
    sync::Arc,
};

use tracing::trace;

use crate::types::{LobError, Result};

mod encrypted;
mod temp;

pub use encrypted::{EncryptedFileIo, EncryptionKey, ENCRYPTION_KEY_LEN};
pub use temp::{StorageFactory, TempDirStorage, TempFile};

/// Positioned access to the storage behind one spilled LOB.
///
/// Implementations never keep a cursor of their own; [`crate::LobFile`]
/// tracks the cursor and passes absolute offsets.
pub trait FileIo: Send + Sync + 'static {
    /// Fills `dst` from offset `off`; reading past the end is an error.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Writes all of `src` at offset `off`, extending the file if needed.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Current length in bytes.
    fn len(&self) -> Result<u64>;
    /// Cuts or extends the file to `len` bytes.
    fn truncate(&self, len: u64) -> Result<()>;
}

/// Plain [`FileIo`] over an open temporary file.
#[derive(Clone)]
pub struct StdFileIo {
    inner: Arc<File>,
}

impl StdFileIo {
    /// Wraps an open read-write handle.
    pub fn new(file: File) -> Self {
        Self {
            inner: Arc::new(file),
        }
    }
}

#[cfg(unix)]
fn read_chunk(file: &File, dst: &mut [u8], off: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, dst, off)
}

#[cfg(unix)]
fn write_chunk(file: &File, src: &[u8], off: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, src, off)
}

#[cfg(windows)]
fn read_chunk(file: &File, dst: &mut [u8], off: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, dst, off)
}

#[cfg(windows)]
fn write_chunk(file: &File, src: &[u8], off: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, src, off)
}

#[cfg(not(any(unix, windows)))]
fn read_chunk(_file: &File, _dst: &mut [u8], _off: u64) -> io::Result<usize> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "positioned reads unsupported on this platform",
    ))
}

#[cfg(not(any(unix, windows)))]
fn write_chunk(_file: &File, _src: &[u8], _off: u64) -> io::Result<usize> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "positioned writes unsupported on this platform",
    ))
}

impl FileIo for StdFileIo {
    fn read_at(&self, mut off: u64, mut dst: &mut [u8]) -> Result<()> {
        while !dst.is_empty() {
            match read_chunk(&self.inner, dst, off) {
                Ok(0) => {
                    trace!(off, remaining = dst.len(), "io.read_at.eof");
                    return Err(LobError::Io(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "LOB file ended before the requested range",
                    )));
                }
                Ok(read) => {
                    let (_, tail) = dst.split_at_mut(read);
                    dst = tail;
                    off += read as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn write_at(&self, mut off: u64, mut src: &[u8]) -> Result<()> {
        while !src.is_empty() {
            match write_chunk(&self.inner, src, off) {
                Ok(0) => {
                    return Err(LobError::Io(io::Error::new(
                        ErrorKind::WriteZero,
                        "LOB file accepted no bytes",
                    )));
                }
                Ok(written) => {
                    src = &src[written..];
                    off += written as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.inner.metadata()?.len())
    }

    fn truncate(&self, len: u64) -> Result<()> {
        self.inner.set_len(len)?;
        Ok(())
    }
}
