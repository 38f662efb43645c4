//! Low-level primitives the LOB layer is built on.

/// Positioned file I/O, encryption and temporary file creation.
pub mod io;
