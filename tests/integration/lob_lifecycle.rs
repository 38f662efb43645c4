#![allow(missing_docs)]

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use sombra_lob::{LobError, LobStreamControl, Result};
use tempfile::tempdir;

use common::{files_in, session_in};

const LOBS: usize = 8;

#[test]
fn concurrent_free_and_sweep_close_each_file_once() -> Result<()> {
    for _round in 0..16 {
        let dir = tempdir()?;
        let session = session_in(dir.path(), 64);
        let controls = (0..LOBS)
            .map(|i| LobStreamControl::with_bytes(&session, &vec![i as u8; 512]).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(session.open_lob_files(), LOBS);

        let barrier = Arc::new(Barrier::new(LOBS + 1));
        let mut handles = Vec::new();
        for control in &controls {
            let control = Arc::clone(control);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || -> Result<()> {
                barrier.wait();
                control.free()
            }));
        }
        let sweeper = {
            let session = session.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<usize> {
                barrier.wait();
                session.close_lob_files()
            })
        };
        for handle in handles {
            handle.join().expect("free thread")?;
        }
        let swept = sweeper.join().expect("sweep thread")?;
        assert!(swept <= LOBS);

        let metrics = session.metrics();
        assert_eq!(metrics.files_created, LOBS as u64);
        assert_eq!(metrics.files_released, LOBS as u64);
        assert_eq!(session.open_lob_files(), 0);
        assert_eq!(files_in(dir.path()), 0);
    }
    Ok(())
}

#[test]
fn racing_frees_on_one_lob_release_once() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 32);
    let control = Arc::new(LobStreamControl::with_bytes(&session, &[1u8; 300])?);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let control = Arc::clone(&control);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<()> {
                barrier.wait();
                control.free()
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("free thread")?;
    }
    assert!(control.is_freed());
    assert_eq!(session.metrics().files_released, 1);
    assert_eq!(files_in(dir.path()), 0);
    Ok(())
}

#[test]
fn sweep_leaves_lobs_closed_but_freeable() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 32);
    let spilled = LobStreamControl::with_bytes(&session, &[3u8; 200])?;
    let small = LobStreamControl::with_bytes(&session, b"kept in memory")?;

    assert_eq!(session.close_lob_files()?, 1);
    assert_eq!(files_in(dir.path()), 0);
    assert!(matches!(spilled.read_byte(0), Err(LobError::Closed)));
    assert_eq!(small.read_byte(0)?, Some(b'k'));

    spilled.free()?;
    small.free()?;
    assert_eq!(session.metrics().files_released, 1);
    Ok(())
}

#[test]
fn dropping_lobs_on_other_threads_releases_files() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 32);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let control = LobStreamControl::with_bytes(&session, &vec![i as u8; 200]);
            thread::spawn(move || -> Result<()> {
                let control = control?;
                assert!(control.is_file_backed());
                drop(control);
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("drop thread")?;
    }
    assert_eq!(session.open_lob_files(), 0);
    assert_eq!(session.metrics().live_files(), 0);
    assert_eq!(files_in(dir.path()), 0);
    Ok(())
}

#[test]
fn controller_keeps_session_alive_until_dropped() -> Result<()> {
    let dir = tempdir()?;
    let session = session_in(dir.path(), 32);
    let control = Arc::new(LobStreamControl::with_bytes(&session, &[9u8; 200])?);
    assert_eq!(files_in(dir.path()), 1);
    // The controller keeps its own session handle alive.
    drop(session);
    assert_eq!(files_in(dir.path()), 1);
    drop(control);
    assert_eq!(files_in(dir.path()), 0);
    Ok(())
}
