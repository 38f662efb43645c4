#![allow(missing_docs)]

mod common;

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use sombra_lob::{LobStreamControl, Result};
use tempfile::tempdir;

use common::{read_all, session_in};

#[test]
fn io_copy_through_output_and_input_streams() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 128);
    let control = Arc::new(LobStreamControl::new(&session));
    let payload: Vec<u8> = (0..5_000u32).map(|i| (i * 7 % 256) as u8).collect();

    let mut out = control.output_stream(0);
    let copied = io::copy(&mut Cursor::new(&payload), &mut out)?;
    assert_eq!(copied, payload.len() as u64);
    assert_eq!(out.position(), payload.len() as i64);
    out.close();
    assert!(control.is_file_backed());

    let mut input = control.input_stream(0);
    assert_eq!(input.length()?, payload.len() as u64);
    let mut back = Vec::new();
    input.read_to_end(&mut back)?;
    assert_eq!(back, payload);
    assert_eq!(input.position(), payload.len() as i64);
    Ok(())
}

#[test]
fn output_stream_overwrites_from_its_position() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 64);
    let control = Arc::new(LobStreamControl::with_bytes(&session, b"0123456789")?);
    let mut out = control.output_stream(4);
    out.write_all(b"ab")?;
    out.write_all(b"cdefgh")?;
    out.flush()?;
    assert_eq!(out.position(), 12);
    assert_eq!(read_all(&control), b"0123abcdefgh");
    Ok(())
}

#[test]
fn input_stream_detects_modification_and_reinitializes() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 64);
    let control = Arc::new(LobStreamControl::with_bytes(&session, b"first version")?);
    let mut input = control.input_stream(6);
    let mut word = [0u8; 7];
    input.read_exact(&mut word)?;
    assert_eq!(&word, b"version");
    assert!(!input.is_obsolete());

    control.replace_bytes(b"second", 0, 5)?;
    assert!(input.is_obsolete());

    input.reinitialize();
    assert!(!input.is_obsolete());
    assert_eq!(input.position(), 6);
    let mut rest = String::new();
    input.read_to_string(&mut rest)?;
    assert_eq!(rest, " version");
    Ok(())
}

#[test]
fn sequential_streams_share_one_lob() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 16);
    let control = Arc::new(LobStreamControl::new(&session));
    for chunk in [&b"alpha "[..], b"beta ", b"gamma delta"] {
        let start = control.len()? as i64;
        let mut out = control.output_stream(start);
        out.write_all(chunk)?;
        out.close();
    }
    let mut text = String::new();
    control.input_stream(0).read_to_string(&mut text)?;
    assert_eq!(text, "alpha beta gamma delta");
    assert!(!control.is_freed());
    Ok(())
}

#[test]
fn stream_errors_surface_as_io_errors() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 16);
    let control = Arc::new(LobStreamControl::with_bytes(&session, b"short")?);

    let mut past_end = control.input_stream(9);
    let err = past_end.read(&mut [0u8; 4]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    let mut input = control.input_stream(0);
    let mut too_long = [0u8; 8];
    let err = input.read_exact(&mut too_long).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    assert_eq!(input.read(&mut []).unwrap(), 0);

    let mut out = control.output_stream(0);
    control.free()?;
    let err = out.write(b"x").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    Ok(())
}
