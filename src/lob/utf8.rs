use crate::types::{LobError, Result};

/// Width of the character introduced by `lead`.
///
/// Only the one, two and three byte forms are accepted; continuation bytes
/// and four byte leads yield `None`.
pub fn char_width(lead: u8) -> Option<usize> {
    if lead & 0x80 == 0 {
        Some(1)
    } else if lead & 0xE0 == 0xC0 {
        Some(2)
    } else if lead & 0xF0 == 0xE0 {
        Some(3)
    } else {
        None
    }
}

/// Counts characters of a UTF-8 byte stream delivered in arbitrary chunks.
///
/// Only lead bytes are inspected. A character cut by a chunk boundary is
/// counted when its lead byte is seen; the bytes it still owes are skipped
/// at the start of the following chunk(s).
#[derive(Debug, Default, Clone)]
pub struct Utf8CharCounter {
    chars: u64,
    pending: usize,
}

impl Utf8CharCounter {
    /// Creates a counter with nothing consumed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters counted so far.
    pub fn chars(&self) -> u64 {
        self.chars
    }

    /// Bytes of the last counted character not delivered yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Consumes one chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        let mut offset = self.pending;
        while offset < chunk.len() {
            let lead = chunk[offset];
            let width = char_width(lead).ok_or(LobError::MalformedEncoding {
                byte: lead,
                char_count: self.chars,
                offset,
            })?;
            offset += width;
            self.chars += 1;
        }
        self.pending = offset - chunk.len();
        Ok(())
    }

    /// Forgets one counted character.
    pub(crate) fn uncount(&mut self) {
        self.chars = self.chars.saturating_sub(1);
    }
}
