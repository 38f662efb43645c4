use std::io::{self, Read, Write};
use std::sync::Arc;

use super::control::LobStreamControl;
use crate::types::Result;

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "stream closed")
}

/// Reader over a [`LobStreamControl`] starting at a fixed position.
///
/// Every read goes straight to the controller. Several streams may be opened
/// on the same LOB; closing one leaves the LOB untouched.
#[derive(Debug)]
pub struct LobInputStream {
    control: Arc<LobStreamControl>,
    initial_pos: i64,
    pos: i64,
    update_count: u64,
    closed: bool,
}

impl LobInputStream {
    pub(crate) fn new(control: Arc<LobStreamControl>, pos: i64) -> Self {
        let update_count = control.update_count();
        Self {
            control,
            initial_pos: pos,
            pos,
            update_count,
            closed: false,
        }
    }

    /// Position of the next byte to read.
    pub fn position(&self) -> i64 {
        self.pos
    }

    /// Current length of the underlying LOB.
    pub fn length(&self) -> Result<u64> {
        self.control.len()
    }

    /// Returns true if the LOB was modified since this stream was created or
    /// last reinitialized.
    pub fn is_obsolete(&self) -> bool {
        self.control.update_count() != self.update_count
    }

    /// Accepts the current content and rewinds to the initial position.
    pub fn reinitialize(&mut self) {
        self.update_count = self.control.update_count();
        self.pos = self.initial_pos;
    }

    /// Marks the stream closed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns true once [`LobInputStream::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for LobInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len();
        match self.control.read(buf, 0, len, self.pos)? {
            Some(read) => {
                self.pos += read as i64;
                Ok(read)
            }
            None => Ok(0),
        }
    }
}

/// Writer over a [`LobStreamControl`] starting at a fixed position.
#[derive(Debug)]
pub struct LobOutputStream {
    control: Arc<LobStreamControl>,
    pos: i64,
    closed: bool,
}

impl LobOutputStream {
    pub(crate) fn new(control: Arc<LobStreamControl>, pos: i64) -> Self {
        Self {
            control,
            pos,
            closed: false,
        }
    }

    /// Position the next byte is written to.
    pub fn position(&self) -> i64 {
        self.pos
    }

    /// Marks the stream closed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns true once [`LobOutputStream::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Write for LobOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.pos = self.control.write(buf, 0, buf.len(), self.pos)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        Ok(())
    }
}
