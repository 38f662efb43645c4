//! Large-object storage for the Sombra database.
//!
//! LOB values start out in memory and move into temporary files, optionally
//! encrypted, once they outgrow their buffer. See [`lob::LobStreamControl`]
//! for the storage controller and [`lob::LobSession`] for the
//! connection-scoped file registry.

#![warn(missing_docs)]

pub mod lob;
pub mod primitives;
pub mod types;

pub use lob::{
    ConfigError, LobFile, LobFileId, LobFileRegistry, LobInputStream, LobMetricsSnapshot,
    LobOptions, LobOutputStream, LobSession, LobStreamControl,
};
pub use primitives::io::{EncryptionKey, FileIo, StdFileIo, StorageFactory, TempDirStorage};
pub use types::{LobError, Result, StreamUnit};
