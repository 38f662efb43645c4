#![allow(missing_docs)]

mod common;

use std::fs;
use std::io::Cursor;

use sombra_lob::lob::{DEFAULT_BUF_SIZE, MAX_BUF_SIZE};
use sombra_lob::{LobError, LobOptions, LobSession, LobStreamControl, Result};
use tempfile::tempdir;

use common::{files_in, read_all, session_in};

#[test]
fn grows_across_threshold_and_shrinks_back() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 64);
    let control = LobStreamControl::new(&session);

    let mut expected = Vec::new();
    let mut pos = 0i64;
    for round in 0..40u8 {
        let chunk = vec![round; 7];
        pos = control.write(&chunk, 0, chunk.len(), pos)?;
        expected.extend_from_slice(&chunk);
        if pos as usize > 64 {
            assert!(control.is_file_backed());
        }
    }
    assert_eq!(read_all(&control), expected);
    assert_eq!(files_in(dir.path()), 1);

    // Overwrite in the middle of a file backed value.
    control.write(b"middle", 0, 6, 100)?;
    expected[100..106].copy_from_slice(b"middle");
    assert_eq!(read_all(&control), expected);

    control.truncate(32)?;
    assert!(!control.is_file_backed());
    assert_eq!(read_all(&control), &expected[..32]);
    assert_eq!(files_in(dir.path()), 0);

    // Promotes again on the next large write.
    control.write(&expected, 32, 100, 32)?;
    assert!(control.is_file_backed());
    assert_eq!(read_all(&control), &expected[..132]);
    let metrics = session.metrics();
    assert_eq!(metrics.promotions, 2);
    assert_eq!(metrics.demotions, 1);
    Ok(())
}

#[test]
fn replace_matches_vec_splice_in_both_representations() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 32);
    let seed: Vec<u8> = (0..24).collect();
    let control = LobStreamControl::with_bytes(&session, &seed)?;
    let mut model = seed.clone();

    let edits: [(&[u8], i64, i64); 5] = [
        (b"AAAA", 2, 4),
        (b"", 0, 3),
        (b"0123456789abcdef", 10, 10),
        (b"zz", 5, 30),
        (b"tail", 9, 9),
    ];
    for (buf, start, end) in edits {
        let next = control.replace_bytes(buf, start, end)?;
        assert_eq!(next, start + buf.len() as i64);
        model.splice(start as usize..end as usize, buf.iter().copied());
        assert_eq!(read_all(&control), model, "after replace {start}..{end}");
    }
    assert_eq!(control.update_count(), edits.len() as u64);
    Ok(())
}

#[test]
fn copy_data_from_file_source() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 512);
    let source_dir = tempdir()?;
    let source = source_dir.path().join("blob.bin");
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&source, &payload)?;

    let control = LobStreamControl::new(&session);
    control.copy_data(&mut fs::File::open(&source)?, Some(payload.len() as u64))?;
    assert_eq!(control.len()?, payload.len() as u64);
    assert_eq!(read_all(&control), payload);

    let err = LobStreamControl::new(&session)
        .copy_data(&mut fs::File::open(&source)?, Some(payload.len() as u64 + 1))
        .unwrap_err();
    assert!(matches!(err, LobError::PrematureEndOfStream { .. }));
    Ok(())
}

#[test]
fn copy_utf8_mixed_width_text() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 64);
    let text: String = "a\u{df}\u{4e2d}".repeat(200);
    let control = LobStreamControl::new(&session);
    let chars = control.copy_utf8_data(&mut Cursor::new(text.as_bytes()), Some(600))?;
    assert_eq!(chars, 600);
    assert_eq!(read_all(&control), text.as_bytes());
    assert!(control.is_file_backed());
    Ok(())
}

#[test]
fn options_loaded_from_toml_drive_buffer_sizes() -> Result<()> {
    let dir = tempdir()?;
    let config = dir.path().join("lob.toml");
    fs::write(
        &config,
        format!(
            "default_buffer_size = 128\nmax_buffer_size = 512\ntemp_dir = {:?}\n",
            dir.path().display().to_string()
        ),
    )?;
    let options = LobOptions::load(&config).expect("config");
    assert_eq!(options.temp_prefix, "lob");
    let session = LobSession::new(options).expect("session");

    assert_eq!(LobStreamControl::new(&session).buffer_size(), 128);
    let seeded = LobStreamControl::with_bytes(&session, &[1u8; 300])?;
    assert_eq!(seeded.buffer_size(), 300);
    assert!(!seeded.is_file_backed());
    let capped = LobStreamControl::with_bytes(&session, &[1u8; 900])?;
    assert_eq!(capped.buffer_size(), 512);
    assert!(capped.is_file_backed());
    Ok(())
}

#[test]
fn default_thresholds() {
    let options = LobOptions::default();
    assert_eq!(options.default_buffer_size, DEFAULT_BUF_SIZE);
    assert_eq!(options.max_buffer_size, MAX_BUF_SIZE);
    assert_eq!(options.buffer_size_for(10), 4096);
    assert_eq!(options.buffer_size_for(10_000), 10_000);
    assert_eq!(options.buffer_size_for(1 << 20), 32768);
}
