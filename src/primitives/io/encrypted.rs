#![forbid(unsafe_code)]

use std::fmt;

use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::FileIo;
use crate::types::Result;

/// Length of an [`EncryptionKey`] in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Key used to encrypt temporary LOB files of an encrypted database.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    bytes: [u8; ENCRYPTION_KEY_LEN],
}

impl EncryptionKey {
    /// Wraps raw key material.
    pub fn from_bytes(bytes: [u8; ENCRYPTION_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generates a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; ENCRYPTION_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Returns the raw key material.
    pub fn as_bytes(&self) -> &[u8; ENCRYPTION_KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// [`FileIo`] wrapper that encrypts everything written to the inner file.
///
/// The cipher is a ChaCha20 keystream addressed by byte offset, so the
/// ciphertext is exactly as long as the plaintext and any byte range can be
/// read or rewritten without touching its neighbours. Each wrapped file gets
/// its own random stream id; reusing a key across files never reuses
/// keystream.
///
/// Bytes that appear on disk without having been written through this
/// wrapper (for example a region added by extending the file with
/// [`FileIo::truncate`]) do not decrypt to zeroes.
pub struct EncryptedFileIo<F: FileIo> {
    inner: F,
    key: EncryptionKey,
    stream: u64,
}

impl<F: FileIo> EncryptedFileIo<F> {
    /// Wraps `inner` using a random stream id.
    pub fn new(inner: F, key: EncryptionKey) -> Self {
        let stream = rand::thread_rng().next_u64();
        Self::with_stream(inner, key, stream)
    }

    /// Wraps `inner` with an explicit stream id.
    pub fn with_stream(inner: F, key: EncryptionKey, stream: u64) -> Self {
        Self { inner, key, stream }
    }

    /// Returns the wrapped file.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn apply_keystream(&self, off: u64, data: &mut [u8]) {
        if data.is_empty() {
            return;
        }
        let skip = (off % 4) as usize;
        let mut rng = ChaCha20Rng::from_seed(*self.key.as_bytes());
        rng.set_stream(self.stream);
        rng.set_word_pos(u128::from(off / 4));
        let mut keystream = vec![0u8; skip + data.len()];
        rng.fill_bytes(&mut keystream);
        for (byte, key) in data.iter_mut().zip(&keystream[skip..]) {
            *byte ^= key;
        }
    }
}

impl<F: FileIo> FileIo for EncryptedFileIo<F> {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        self.inner.read_at(off, dst)?;
        self.apply_keystream(off, dst);
        Ok(())
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        let mut cipher = src.to_vec();
        self.apply_keystream(off, &mut cipher);
        self.inner.write_at(off, &cipher)
    }

    fn len(&self) -> Result<u64> {
        self.inner.len()
    }

    fn truncate(&self, len: u64) -> Result<()> {
        self.inner.truncate(len)
    }
}
