#![forbid(unsafe_code)]

//! Large-object storage.
//!
//! A [`LobStreamControl`] keeps a LOB value in memory while it is small and
//! spills it into a temporary [`LobFile`] once a write would grow it past its
//! buffer size. Backing files are registered with the owning [`LobSession`],
//! which deletes whatever is left when the connection goes away.

mod control;
mod file;
mod metrics;
mod options;
mod registry;
mod session;
mod stream;
mod utf8;


pub use control::{LobStreamControl, EOS_MARKER, MAX_POSITION};
pub use file::{LobFile, LobFileId};
pub use metrics::{LobMetrics, LobMetricsSnapshot};
pub use options::{ConfigError, LobOptions, DEFAULT_BUF_SIZE, MAX_BUF_SIZE};
pub use registry::LobFileRegistry;
pub use session::LobSession;
pub use stream::{LobInputStream, LobOutputStream};
pub use utf8::{char_width, Utf8CharCounter};
