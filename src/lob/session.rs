use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::file::LobFile;
use super::metrics::{LobMetrics, LobMetricsSnapshot};
use super::options::{ConfigError, LobOptions};
use super::registry::LobFileRegistry;
use crate::primitives::io::{StorageFactory, TempDirStorage};
use crate::types::Result;

/// Connection-scoped context shared by every LOB of one connection.
///
/// Owns the storage factory used for spilling, the registry of live backing
/// files and the usage counters. Cloning is cheap. When the connection goes
/// away, [`LobSession::close_lob_files`] force-closes whatever is still
/// registered.
///
/// Every [`crate::LobStreamControl`] holds its own clone, so the session
/// outlives the LOBs created from it. The sweep run when the last clone drops
/// therefore only finds files whose owners leaked without being dropped.
#[derive(Clone)]
pub struct LobSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    options: LobOptions,
    factory: Arc<dyn StorageFactory>,
    registry: LobFileRegistry,
    metrics: Arc<LobMetrics>,
}

impl LobSession {
    /// Creates a session spilling plain temporary files into the configured
    /// temp directory.
    pub fn new(options: LobOptions) -> std::result::Result<Self, ConfigError> {
        let factory = Arc::new(TempDirStorage::new(options.resolved_temp_dir()));
        Self::with_factory(options, factory)
    }

    /// Creates a session on top of an explicit storage factory.
    pub fn with_factory(
        options: LobOptions,
        factory: Arc<dyn StorageFactory>,
    ) -> std::result::Result<Self, ConfigError> {
        options.validate()?;
        let metrics = Arc::new(LobMetrics::default());
        Ok(Self {
            inner: Arc::new(SessionInner {
                registry: LobFileRegistry::with_metrics(metrics.clone()),
                options,
                factory,
                metrics,
            }),
        })
    }

    /// Options the session was created with.
    pub fn options(&self) -> &LobOptions {
        &self.inner.options
    }

    /// Registry of backing files that are still open.
    pub fn registry(&self) -> &LobFileRegistry {
        &self.inner.registry
    }

    /// Returns true if spilled files are encrypted.
    pub fn database_encrypted(&self) -> bool {
        self.inner.factory.database_encrypted()
    }

    /// Snapshot of the session counters.
    pub fn metrics(&self) -> LobMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Number of backing files currently registered.
    pub fn open_lob_files(&self) -> usize {
        self.inner.registry.len()
    }

    /// Closes and deletes every backing file still registered.
    ///
    /// LOBs whose file was closed here report [`crate::LobError::Closed`]
    /// on further file access; freeing them is still safe.
    pub fn close_lob_files(&self) -> Result<usize> {
        self.inner.registry.close_all()
    }

    pub(crate) fn metrics_handle(&self) -> &LobMetrics {
        &self.inner.metrics
    }

    /// Creates and registers a new backing file.
    pub(crate) fn create_file(&self) -> Result<Arc<LobFile>> {
        let inner = &self.inner;
        let file = Arc::new(LobFile::create(
            inner.factory.as_ref(),
            &inner.options.temp_prefix,
        )?);
        inner.registry.add(file.clone());
        inner.metrics.record_file_created();
        Ok(file)
    }

    /// Unregisters `file` and, if it was still registered, closes it.
    ///
    /// The removal must come first: a concurrent sweep either drained the
    /// entry already (and closes it itself) or no longer sees it.
    pub(crate) fn release_file(&self, file: &LobFile) -> Result<()> {
        let Some(registered) = self.inner.registry.remove(file.id()) else {
            debug!(file = file.id().0, "lob.file.release.unregistered");
            return Ok(());
        };
        if registered.close()? {
            self.inner.metrics.record_file_released();
            debug!(file = file.id().0, "lob.file.release");
        }
        Ok(())
    }
}

// Catches leaked handles only; live controllers keep the session alive.
impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Err(err) = self.registry.close_all() {
            warn!(error = %err, "lob.session.drop.sweep_failed");
        }
    }
}

impl fmt::Debug for LobSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobSession")
            .field("options", &self.inner.options)
            .field("encrypted", &self.database_encrypted())
            .field("open_files", &self.open_lob_files())
            .finish()
    }
}
