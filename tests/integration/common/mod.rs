#![allow(dead_code)]

use std::path::Path;
use std::sync::Once;

use sombra_lob::{LobOptions, LobSession};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sombra_lob=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

/// Session spilling into `dir` with a `buffer` byte threshold.
pub fn session_in(dir: &Path, buffer: usize) -> LobSession {
    init_tracing();
    LobSession::new(
        LobOptions::default()
            .temp_dir(dir)
            .default_buffer_size(buffer)
            .max_buffer_size(buffer * 4),
    )
    .expect("session")
}

/// Reads the whole content of `control` through its byte API.
pub fn read_all(control: &sombra_lob::LobStreamControl) -> Vec<u8> {
    let len = control.len().expect("len") as usize;
    let mut out = vec![0u8; len];
    let mut pos = 0;
    while pos < len {
        match control
            .read(&mut out, pos, len - pos, pos as i64)
            .expect("read")
        {
            Some(read) => pos += read,
            None => break,
        }
    }
    out.truncate(pos);
    out
}

/// Number of entries currently in `dir`.
pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read_dir").count()
}
