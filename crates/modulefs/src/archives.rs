//! Shared archive handles.
//!
//! Several module names may resolve to the same archive file. They share one
//! open backend, counted per archive path; the backend is closed when the
//! last filesystem using it closes.
//!
//! Lock discipline: every acquire and release runs under the single table
//! lock. The registry may hold its own lock while acquiring (it constructs
//! filesystems under it), but the table never calls back into the registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::vfs::{VfsOps, VfsResult, ZipBackend};

/// Opens an archive file as a read-only backend.
pub trait ArchiveOpener: Send + Sync {
    fn open(&self, archive: &Path) -> VfsResult<Arc<dyn VfsOps>>;
}

/// Opens archives with [`ZipBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipOpener;

impl ArchiveOpener for ZipOpener {
    fn open(&self, archive: &Path) -> VfsResult<Arc<dyn VfsOps>> {
        Ok(Arc::new(ZipBackend::open(archive)?))
    }
}

struct SharedHandle {
    count: usize,
    backend: Arc<dyn VfsOps>,
}

/// Reference-counted table of open archive backends, keyed by archive path.
pub struct SharedArchiveHandles {
    opener: Arc<dyn ArchiveOpener>,
    handles: Mutex<HashMap<PathBuf, SharedHandle>>,
}

impl std::fmt::Debug for SharedArchiveHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedArchiveHandles")
            .field("open", &self.handles.lock().len())
            .finish()
    }
}

impl Default for SharedArchiveHandles {
    fn default() -> Self {
        Self::new(Arc::new(ZipOpener))
    }
}

impl SharedArchiveHandles {
    /// Create an empty table that opens archives with `opener`.
    pub fn new(opener: Arc<dyn ArchiveOpener>) -> Self {
        Self {
            opener,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Return the shared backend for `archive`, opening it on first use.
    ///
    /// Every successful call must be paired with one [`release`](Self::release).
    pub fn acquire(&self, archive: &Path) -> VfsResult<Arc<dyn VfsOps>> {
        let mut handles = self.handles.lock();

        if let Some(shared) = handles.get_mut(archive) {
            shared.count += 1;
            debug!(archive = %archive.display(), count = shared.count, "reusing open archive");
            return Ok(Arc::clone(&shared.backend));
        }

        let backend = self.opener.open(archive)?;
        info!(archive = %archive.display(), "opened archive");
        handles.insert(
            archive.to_path_buf(),
            SharedHandle {
                count: 1,
                backend: Arc::clone(&backend),
            },
        );
        Ok(backend)
    }

    /// Drop one reference to `archive`, closing the backend at zero.
    ///
    /// # Panics
    ///
    /// Panics if `archive` has no outstanding acquire.
    pub fn release(&self, archive: &Path) {
        let mut handles = self.handles.lock();

        let Some(shared) = handles.get_mut(archive) else {
            panic!("archive {} released without a matching acquire", archive.display());
        };
        shared.count -= 1;
        debug!(archive = %archive.display(), count = shared.count, "released archive");
        if shared.count > 0 {
            return;
        }

        if let Some(shared) = handles.remove(archive) {
            if let Err(e) = shared.backend.close() {
                warn!(archive = %archive.display(), error = %e, "closing archive failed");
            }
            info!(archive = %archive.display(), "closed archive");
        }
    }

    /// Number of live references to `archive`; zero when not open.
    pub fn ref_count(&self, archive: &Path) -> usize {
        self.handles.lock().get(archive).map_or(0, |h| h.count)
    }

    /// Number of archives currently open.
    pub fn open_archives(&self) -> usize {
        self.handles.lock().len()
    }
}
