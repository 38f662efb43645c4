use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::file::{LobFile, LobFileId};
use super::metrics::LobMetrics;
use crate::types::Result;

/// Connection-scoped set of live LOB backing files.
///
/// Whoever removes an entry owns closing it. Both the per-LOB release path
/// and [`LobFileRegistry::close_all`] remove before closing, so a file is
/// closed by exactly one of them.
#[derive(Default, Debug)]
pub struct LobFileRegistry {
    files: Mutex<HashMap<LobFileId, Arc<LobFile>>>,
    metrics: Arc<LobMetrics>,
}

impl LobFileRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry reporting releases into `metrics`.
    pub fn with_metrics(metrics: Arc<LobMetrics>) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Registers a newly created file.
    pub fn add(&self, file: Arc<LobFile>) {
        self.files.lock().insert(file.id(), file);
    }

    /// Unregisters a file, returning it if it was still registered.
    pub fn remove(&self, id: LobFileId) -> Option<Arc<LobFile>> {
        self.files.lock().remove(&id)
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: LobFileId) -> bool {
        self.files.lock().contains_key(&id)
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Returns true if no file is registered.
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Unregisters every file and closes it.
    ///
    /// All files are attempted; the first failure is returned and later ones
    /// are logged. Returns the number of files this call closed.
    pub fn close_all(&self) -> Result<usize> {
        let drained: Vec<Arc<LobFile>> = {
            let mut files = self.files.lock();
            files.drain().map(|(_, file)| file).collect()
        };
        if drained.is_empty() {
            return Ok(0);
        }
        let mut closed = 0usize;
        let mut first_err = None;
        for file in drained {
            match file.close() {
                Ok(true) => {
                    self.metrics.record_file_released();
                    closed += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    } else {
                        warn!(file = file.id().0, error = %err, "lob.registry.sweep.close_failed");
                    }
                }
            }
        }
        debug!(closed, "lob.registry.sweep");
        match first_err {
            Some(err) => Err(err),
            None => Ok(closed),
        }
    }
}
