use std::fmt;
use std::io::{self, Read};
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::file::LobFile;
use super::session::LobSession;
use super::stream::{LobInputStream, LobOutputStream};
use super::utf8::Utf8CharCounter;
use crate::types::{LobError, Result, StreamUnit};

/// Largest position accepted by any LOB operation.
pub const MAX_POSITION: i64 = i32::MAX as i64;

/// Legacy end-of-stream marker stripped from the tail of streamed copies.
pub const EOS_MARKER: [u8; 3] = [0xE0, 0x00, 0x00];

/// Mutable storage of one LOB value.
///
/// Content lives in a memory buffer until a write would place data past the
/// buffer size, at which point it moves to a temporary file registered with
/// the owning [`LobSession`]. Truncating below the buffer size moves it back.
/// All operations on one instance are serialized by an internal lock.
pub struct LobStreamControl {
    session: LobSession,
    buffer_size: usize,
    state: Mutex<ControlState>,
}

struct ControlState {
    storage: Storage,
    update_count: u64,
}

enum Storage {
    Memory(Vec<u8>),
    File(Arc<LobFile>),
    Freed,
}

impl LobStreamControl {
    /// Creates an empty LOB held in memory.
    pub fn new(session: &LobSession) -> Self {
        let buffer_size = session.options().default_buffer_size;
        Self::with_buffer_size(session, buffer_size)
    }

    /// Creates a LOB holding a copy of `data`.
    ///
    /// The buffer size grows with `data` up to the configured maximum; only
    /// seeds larger than that maximum start out file backed. Seeding is not
    /// counted as an update.
    pub fn with_bytes(session: &LobSession, data: &[u8]) -> Result<Self> {
        let buffer_size = session.options().buffer_size_for(data.len());
        let control = Self::with_buffer_size(session, buffer_size);
        {
            let mut state = control.state.lock();
            control.write_at_locked(&mut state, data, 0)?;
            state.update_count = 0;
        }
        Ok(control)
    }

    fn with_buffer_size(session: &LobSession, buffer_size: usize) -> Self {
        Self {
            session: session.clone(),
            buffer_size,
            state: Mutex::new(ControlState {
                storage: Storage::Memory(Vec::new()),
                update_count: 0,
            }),
        }
    }

    /// Promotion threshold in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Session this LOB spills into.
    pub fn session(&self) -> &LobSession {
        &self.session
    }

    /// Returns true while the content lives in a temporary file.
    pub fn is_file_backed(&self) -> bool {
        matches!(self.state.lock().storage, Storage::File(_))
    }

    /// Returns true once [`LobStreamControl::free`] has run.
    pub fn is_freed(&self) -> bool {
        matches!(self.state.lock().storage, Storage::Freed)
    }

    /// Number of mutating operations applied so far.
    pub fn update_count(&self) -> u64 {
        self.state.lock().update_count
    }

    /// Length of the content in bytes.
    pub fn len(&self) -> Result<u64> {
        let state = self.state.lock();
        state.len()
    }

    /// Returns true if the content is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes one byte at `pos` and returns the position after it.
    pub fn write_byte(&self, byte: u8, pos: i64) -> Result<i64> {
        let mut state = self.state.lock();
        let upos = state.check_position(pos)?;
        state.update_count += 1;
        if let Storage::Memory(data) = &mut state.storage {
            if (upos as usize) < self.buffer_size {
                update_data(data, &[byte], upos as usize)?;
                return Ok(pos + 1);
            }
            self.promote(&mut state)?;
        }
        let file = state.file()?;
        if file.position()? != upos {
            file.seek(upos)?;
        }
        Ok(file.write_byte(byte)? as i64)
    }

    /// Writes `buf[off..off + len]` at `pos` and returns the position after
    /// the written bytes.
    ///
    /// An offset/length pair outside `buf` fails with
    /// [`LobError::IndexOutOfBounds`].
    pub fn write(&self, buf: &[u8], off: usize, len: usize, pos: i64) -> Result<i64> {
        let mut state = self.state.lock();
        let upos = state.check_position(pos)?;
        let src = slice_range(buf.len(), off, len)
            .map(|range| &buf[range])
            .ok_or(LobError::IndexOutOfBounds {
                off,
                len,
                buf_len: buf.len(),
            })?;
        self.write_at_locked(&mut state, src, upos)
    }

    /// Reads the byte at `pos`, `None` at the end of the content.
    pub fn read_byte(&self, pos: i64) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let state = self.state.lock();
        let upos = state.check_position(pos)?;
        Ok(state.read_at(&mut byte, upos)?.map(|_| byte[0]))
    }

    /// Reads up to `len` bytes at `pos` into `buf[off..]`.
    ///
    /// Returns the number of bytes read, or `None` if `pos` is at the end of
    /// the content.
    pub fn read(
        &self,
        buf: &mut [u8],
        off: usize,
        len: usize,
        pos: i64,
    ) -> Result<Option<usize>> {
        let state = self.state.lock();
        let upos = state.check_position(pos)?;
        if off > buf.len() {
            return Err(LobError::InvalidOffset {
                off,
                len: buf.len(),
            });
        }
        let range = slice_range(buf.len(), off, len).ok_or(LobError::IndexOutOfBounds {
            off,
            len,
            buf_len: buf.len(),
        })?;
        state.read_at(&mut buf[range], upos)
    }

    /// Cuts the content down to `size` bytes.
    ///
    /// A file backed LOB truncated below its buffer size moves back into
    /// memory and its file is released.
    pub fn truncate(&self, size: i64) -> Result<()> {
        let mut state = self.state.lock();
        let usize_ = state.check_position(size)?;
        self.truncate_locked(&mut state, usize_)
    }

    /// Replaces the bytes in `[start, end)` with `buf` and returns
    /// `start + buf.len()`.
    ///
    /// The content after `end` shifts to follow the new bytes. A file backed
    /// LOB is rewritten into a fresh file; the old one is released once the
    /// copy is complete.
    pub fn replace_bytes(&self, buf: &[u8], start: i64, end: i64) -> Result<i64> {
        let mut state = self.state.lock();
        let ustart = state.check_position(start)?;
        let uend = state.check_position(end)?;
        if uend < ustart {
            return Err(LobError::Invalid("replace range ends before it starts"));
        }
        let len = state.len()?;
        let mut retired = None;
        match &mut state.storage {
            Storage::Memory(data) => {
                let final_len = len - (uend - ustart) + buf.len() as u64;
                if final_len > self.buffer_size as u64 {
                    let file = self.spill(&data[..ustart as usize])?;
                    let filled = file
                        .write(buf)
                        .and_then(|_| file.write(&data[uend as usize..]));
                    if let Err(err) = filled {
                        self.discard(&file);
                        return Err(err);
                    }
                    state.storage = Storage::File(file);
                    self.session.metrics_handle().record_promotion();
                    debug!(
                        len = final_len,
                        buffer_size = self.buffer_size,
                        "lob.promote.replace"
                    );
                } else {
                    data.splice(ustart as usize..uend as usize, buf.iter().copied());
                }
            }
            Storage::File(old) => {
                let old = old.clone();
                let new = self.session.create_file()?;
                let copied = self
                    .copy_file_range(&old, &new, 0, ustart)
                    .and_then(|_| new.write(buf))
                    .and_then(|_| self.copy_file_range(&old, &new, uend, len));
                if let Err(err) = copied {
                    self.discard(&new);
                    return Err(err);
                }
                debug!(
                    old = old.id().0,
                    new = new.id().0,
                    start = ustart,
                    end = uend,
                    inserted = buf.len(),
                    "lob.replace.rewrite"
                );
                state.storage = Storage::File(new);
                retired = Some(old);
            }
            Storage::Freed => return Err(LobError::Freed),
        }
        state.update_count += 1;
        if let Some(old) = retired {
            self.session.release_file(&old)?;
        }
        Ok(start + buf.len() as i64)
    }

    /// Loads binary content from `input`, writing from position zero.
    ///
    /// With `Some(length)` exactly that many bytes are expected and a shorter
    /// source fails with [`LobError::PrematureEndOfStream`]; `None` reads to
    /// the end of `input`. A trailing [`EOS_MARKER`] is removed afterwards.
    pub fn copy_data<R: Read + ?Sized>(
        &self,
        input: &mut R,
        length: Option<u64>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let mut chunk = vec![0u8; self.buffer_size];
        let mut written = 0u64;
        loop {
            let want = match length {
                Some(limit) if written >= limit => break,
                Some(limit) => (limit - written).min(chunk.len() as u64) as usize,
                None => chunk.len(),
            };
            let read = read_some(input, &mut chunk[..want])?;
            if read == 0 {
                if let Some(limit) = length {
                    return Err(LobError::PrematureEndOfStream {
                        expected: limit,
                        actual: written,
                        unit: StreamUnit::Bytes,
                    });
                }
                break;
            }
            self.write_at_locked(&mut state, &chunk[..read], written)?;
            written += read as u64;
        }
        let stripped = self.strip_eos_marker(&mut state)?;
        trace!(written, stripped, "lob.copy_data");
        Ok(())
    }

    /// Loads UTF-8 encoded character content from `input`, writing from
    /// position zero, and returns the number of characters stored.
    ///
    /// Reading stops once `char_length` characters were seen and the last of
    /// them is complete (the chunk that reaches the count is stored whole), or
    /// at the end of `input` when `char_length` is `None`. A trailing
    /// [`EOS_MARKER`] is removed and not counted. With a finite
    /// `char_length`, any other final count fails with
    /// [`LobError::PrematureEndOfStream`].
    pub fn copy_utf8_data<R: Read + ?Sized>(
        &self,
        input: &mut R,
        char_length: Option<u64>,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        let mut chunk = vec![0u8; self.buffer_size];
        let mut counter = Utf8CharCounter::new();
        let mut byte_pos = 0u64;
        loop {
            let want = match char_length {
                Some(limit) if counter.chars() >= limit => match counter.pending() {
                    0 => break,
                    // Finish the last character without starting another.
                    owed => owed.min(chunk.len()),
                },
                _ => chunk.len(),
            };
            let read = read_some(input, &mut chunk[..want])?;
            if read == 0 {
                break;
            }
            counter.feed(&chunk[..read])?;
            self.write_at_locked(&mut state, &chunk[..read], byte_pos)?;
            byte_pos += read as u64;
        }
        if self.strip_eos_marker(&mut state)? {
            counter.uncount();
        }
        if let Some(limit) = char_length {
            if counter.chars() != limit {
                return Err(LobError::PrematureEndOfStream {
                    expected: limit,
                    actual: counter.chars(),
                    unit: StreamUnit::Chars,
                });
            }
        }
        trace!(bytes = byte_pos, chars = counter.chars(), "lob.copy_utf8_data");
        Ok(counter.chars())
    }

    /// Returns a reader starting at `pos`.
    pub fn input_stream(self: &Arc<Self>, pos: i64) -> LobInputStream {
        LobInputStream::new(self.clone(), pos)
    }

    /// Returns a writer starting at `pos`.
    pub fn output_stream(self: &Arc<Self>, pos: i64) -> LobOutputStream {
        LobOutputStream::new(self.clone(), pos)
    }

    /// Releases the content and deletes the backing file, if any.
    ///
    /// Safe to call repeatedly and concurrently with a session sweep; the
    /// file is closed by whichever of them unregisters it first.
    pub fn free(&self) -> Result<()> {
        let storage = mem::replace(&mut self.state.lock().storage, Storage::Freed);
        match storage {
            Storage::File(file) => self.session.release_file(&file),
            Storage::Memory(_) | Storage::Freed => Ok(()),
        }
    }

    fn write_at_locked(
        &self,
        state: &mut ControlState,
        src: &[u8],
        upos: u64,
    ) -> Result<i64> {
        state.update_count += 1;
        if let Storage::Memory(data) = &mut state.storage {
            let end = upos as usize + src.len();
            if end <= self.buffer_size {
                update_data(data, src, upos as usize)?;
                return Ok(end as i64);
            }
            self.promote(state)?;
        }
        let file = state.file()?;
        if file.position()? != upos {
            file.seek(upos)?;
        }
        Ok(file.write(src)? as i64)
    }

    fn truncate_locked(&self, state: &mut ControlState, size: u64) -> Result<()> {
        match &mut state.storage {
            Storage::Memory(data) => data.truncate(size as usize),
            Storage::File(file) if size < self.buffer_size as u64 => {
                let file = file.clone();
                let mut data = vec![0u8; size as usize];
                read_file_range(&file, 0, &mut data)?;
                state.storage = Storage::Memory(data);
                state.update_count += 1;
                self.session.metrics_handle().record_demotion();
                debug!(file = file.id().0, len = size, "lob.demote");
                return self.session.release_file(&file);
            }
            Storage::File(file) => file.set_length(size)?,
            Storage::Freed => return Err(LobError::Freed),
        }
        state.update_count += 1;
        Ok(())
    }

    fn promote(&self, state: &mut ControlState) -> Result<()> {
        let Storage::Memory(data) = &state.storage else {
            return Ok(());
        };
        let file = self.spill(data)?;
        debug!(
            file = file.id().0,
            len = data.len(),
            buffer_size = self.buffer_size,
            "lob.promote"
        );
        state.storage = Storage::File(file);
        self.session.metrics_handle().record_promotion();
        Ok(())
    }

    /// Creates a registered backing file holding `prefix`, cursor at its end.
    fn spill(&self, prefix: &[u8]) -> Result<Arc<LobFile>> {
        let file = self.session.create_file()?;
        if !prefix.is_empty() {
            if let Err(err) = file.write(prefix) {
                self.discard(&file);
                return Err(err);
            }
        }
        Ok(file)
    }

    /// Releases a file that never became the authoritative storage.
    fn discard(&self, file: &LobFile) {
        if let Err(err) = self.session.release_file(file) {
            warn!(file = file.id().0, error = %err, "lob.file.discard_failed");
        }
    }

    fn copy_file_range(
        &self,
        from: &LobFile,
        to: &LobFile,
        start: u64,
        end: u64,
    ) -> Result<()> {
        let mut chunk = vec![0u8; self.buffer_size];
        let mut pos = start;
        while pos < end {
            let want = (end - pos).min(chunk.len() as u64) as usize;
            read_file_range(from, pos, &mut chunk[..want])?;
            to.write(&chunk[..want])?;
            pos += want as u64;
        }
        Ok(())
    }

    fn strip_eos_marker(&self, state: &mut ControlState) -> Result<bool> {
        let len = state.len()?;
        if len <= 2 {
            return Ok(false);
        }
        let mut tail = [0u8; 3];
        if state.read_at(&mut tail, len - 3)? != Some(tail.len()) || tail != EOS_MARKER {
            return Ok(false);
        }
        self.truncate_locked(state, len - 3)?;
        Ok(true)
    }
}

impl ControlState {
    fn len(&self) -> Result<u64> {
        match &self.storage {
            Storage::Memory(data) => Ok(data.len() as u64),
            Storage::File(file) => file.len(),
            Storage::Freed => Err(LobError::Freed),
        }
    }

    fn file(&self) -> Result<&Arc<LobFile>> {
        match &self.storage {
            Storage::File(file) => Ok(file),
            Storage::Memory(_) => Err(LobError::Invalid("LOB is not file backed")),
            Storage::Freed => Err(LobError::Freed),
        }
    }

    /// Validates `pos` against the 32-bit limit and the current length.
    fn check_position(&self, pos: i64) -> Result<u64> {
        let len = self.len()?;
        let limit = (len.min(MAX_POSITION as u64)) as i64;
        if pos < 0 || pos > MAX_POSITION || pos as u64 > len {
            return Err(LobError::InvalidPosition { pos, limit });
        }
        Ok(pos as u64)
    }

    fn read_at(&self, dst: &mut [u8], upos: u64) -> Result<Option<usize>> {
        match &self.storage {
            Storage::Memory(data) => {
                let start = upos as usize;
                if start >= data.len() {
                    return Ok(None);
                }
                let count = dst.len().min(data.len() - start);
                dst[..count].copy_from_slice(&data[start..start + count]);
                Ok(Some(count))
            }
            Storage::File(file) => {
                if upos >= file.len()? {
                    return Ok(None);
                }
                if file.position()? != upos {
                    file.seek(upos)?;
                }
                file.read(dst)
            }
            Storage::Freed => Err(LobError::Freed),
        }
    }
}

/// Writes `src` at `pos` into an in-memory buffer, growing it as needed.
fn update_data(data: &mut Vec<u8>, src: &[u8], pos: usize) -> Result<()> {
    if pos > data.len() {
        return Err(LobError::InvalidPosition {
            pos: pos as i64,
            limit: data.len() as i64,
        });
    }
    let end = pos + src.len();
    if end <= data.len() {
        data[pos..end].copy_from_slice(src);
    } else {
        data.truncate(pos);
        data.extend_from_slice(src);
    }
    Ok(())
}

fn slice_range(buf_len: usize, off: usize, len: usize) -> Option<std::ops::Range<usize>> {
    let end = off.checked_add(len)?;
    (end <= buf_len).then_some(off..end)
}

fn read_file_range(file: &LobFile, start: u64, dst: &mut [u8]) -> Result<()> {
    file.seek(start)?;
    let mut filled = 0;
    while filled < dst.len() {
        match file.read(&mut dst[filled..])? {
            Some(read) if read > 0 => filled += read,
            _ => {
                return Err(LobError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "LOB file shorter than expected",
                )))
            }
        }
    }
    Ok(())
}

fn read_some<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match input.read(buf) {
            Ok(read) => return Ok(read),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

impl Drop for LobStreamControl {
    fn drop(&mut self) {
        if let Err(err) = self.free() {
            warn!(error = %err, "lob.drop.free_failed");
        }
    }
}

impl fmt::Debug for LobStreamControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let repr = match &state.storage {
            Storage::Memory(data) => format!("memory({} bytes)", data.len()),
            Storage::File(file) => format!("file({})", file.id()),
            Storage::Freed => "freed".to_string(),
        };
        f.debug_struct("LobStreamControl")
            .field("buffer_size", &self.buffer_size)
            .field("storage", &repr)
            .field("update_count", &state.update_count)
            .finish()
    }
}
