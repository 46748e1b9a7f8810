//! Module filesystems.
//!
//! A [`ModuleFileSystem`] exposes one module's content. It owns the module
//! name, a base path inside its backend, and the backend itself. The three
//! backend kinds share one type; kind-specific state lives in [`Backing`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::archives::SharedArchiveHandles;
use crate::error::ModuleFsResult;
use crate::files::ModuleFileStore;
use crate::matcher::PathMatcher;
use crate::path::ModulePath;
use crate::registry::FileSystemRegistry;
use crate::uri;
use crate::vfs::VfsOps;

/// Kind of physical store behind a module filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// Platform module image.
    Image,
    /// Zip-style archive file.
    Archive,
    /// Exploded module directory.
    Directory,
}

/// Kind-specific state.
pub(crate) enum Backing {
    Image,
    Archive {
        archive: PathBuf,
        handles: Arc<SharedArchiveHandles>,
    },
    Directory,
}

impl Backing {
    fn kind(&self) -> BackendKind {
        match self {
            Backing::Image => BackendKind::Image,
            Backing::Archive { .. } => BackendKind::Archive,
            Backing::Directory => BackendKind::Directory,
        }
    }
}

/// A virtual filesystem over one module.
///
/// Shared as `Arc<ModuleFileSystem>`; two paths belong to the same
/// filesystem only if their `Arc`s point at the same instance. Closing is
/// idempotent, and dropping the last reference to an open filesystem
/// releases its backend the same way [`close`](Self::close) does.
pub struct ModuleFileSystem {
    module: String,
    base: PathBuf,
    backend: Arc<dyn VfsOps>,
    backing: Backing,
    open: AtomicBool,
    registry: Weak<FileSystemRegistry>,
}

impl std::fmt::Debug for ModuleFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFileSystem")
            .field("module", &self.module)
            .field("kind", &self.kind())
            .field("base", &self.base)
            .field("open", &self.is_open())
            .finish()
    }
}

impl ModuleFileSystem {
    pub(crate) fn new(
        module: impl Into<String>,
        base: impl Into<PathBuf>,
        backend: Arc<dyn VfsOps>,
        backing: Backing,
        registry: Weak<FileSystemRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            module: module.into(),
            base: base.into(),
            backend,
            backing,
            open: AtomicBool::new(true),
            registry,
        })
    }

    /// Module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Filesystem-identity address, `module:/<name>`.
    pub fn address(&self) -> String {
        uri::filesystem_address(&self.module)
    }

    pub fn kind(&self) -> BackendKind {
        self.backing.kind()
    }

    /// Path of the module root inside the backend.
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// The native backend every operation is delegated to.
    pub fn backend(&self) -> &Arc<dyn VfsOps> {
        &self.backend
    }

    /// Archive file behind an archive-backed filesystem.
    pub fn archive_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Archive { archive, .. } => Some(archive),
            Backing::Image | Backing::Directory => None,
        }
    }

    /// Returns false once closed, or once the backend itself has closed.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.backend.is_open()
    }

    /// Archive and image filesystems are always read-only; directory
    /// filesystems follow the directory's permissions.
    pub fn is_read_only(&self) -> bool {
        match self.backing {
            Backing::Image | Backing::Archive { .. } => true,
            Backing::Directory => self.backend.read_only(),
        }
    }

    pub fn separator(&self) -> &'static str {
        "/"
    }

    /// The module root.
    pub fn root(self: &Arc<Self>) -> ModulePath {
        ModulePath::new(Arc::clone(self), self.base.clone())
    }

    /// Root directories; a module filesystem has exactly one.
    pub fn root_directories(self: &Arc<Self>) -> Vec<ModulePath> {
        vec![self.root()]
    }

    /// Join `first` and `more` under the module root.
    ///
    /// Segments may contain `/`. A leading `/` is ignored, so the result is
    /// always inside the module.
    pub fn get_path(self: &Arc<Self>, first: &str, more: &[&str]) -> ModulePath {
        let mut path = self.base.clone();
        for segment in std::iter::once(first).chain(more.iter().copied()) {
            let segment = segment.trim_start_matches('/');
            if !segment.is_empty() {
                path.push(segment);
            }
        }
        ModulePath::new(Arc::clone(self), path)
    }

    /// The single file store of this filesystem.
    pub fn file_store(&self) -> ModuleFsResult<ModuleFileStore> {
        ModuleFileStore::of(self)
    }

    /// Compile a `glob:` or `regex:` matcher over backend paths.
    pub fn path_matcher(&self, syntax_and_pattern: &str) -> ModuleFsResult<PathMatcher> {
        PathMatcher::new(syntax_and_pattern)
    }

    /// Close this filesystem and remove it from the registry.
    ///
    /// Archive-backed filesystems release their shared archive handle;
    /// the others only flip their open flag. Closing twice is a no-op.
    pub fn close(&self) -> ModuleFsResult<()> {
        if self
            .open
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        self.release();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if_same(&self.module, self);
        }
        debug!(module = %self.module, kind = %self.kind(), "closed module file system");
        Ok(())
    }

    fn release(&self) {
        if let Backing::Archive { archive, handles } = &self.backing {
            handles.release(archive);
        }
    }
}

impl Drop for ModuleFileSystem {
    fn drop(&mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;

    fn directory_fs() -> Arc<ModuleFileSystem> {
        ModuleFileSystem::new(
            "com.example.core",
            "/",
            Arc::new(MemoryBackend::new()),
            Backing::Directory,
            Weak::new(),
        )
    }

    fn image_fs() -> Arc<ModuleFileSystem> {
        ModuleFileSystem::new(
            "base",
            "/modules/base",
            Arc::new(MemoryBackend::read_only_from([("modules/base/a.txt", "a")])),
            Backing::Image,
            Weak::new(),
        )
    }

    #[test]
    fn test_get_path_stays_under_base() {
        let fs = image_fs();
        assert_eq!(fs.get_path("a.txt", &[]).backend_path(), Path::new("/modules/base/a.txt"));
        assert_eq!(
            fs.get_path("/com/example", &["x", "y.txt"]).backend_path(),
            Path::new("/modules/base/com/example/x/y.txt")
        );
        assert_eq!(fs.get_path("", &[]).backend_path(), Path::new("/modules/base"));
    }

    #[test]
    fn test_surface() {
        let fs = image_fs();
        assert_eq!(fs.address(), "module:/base");
        assert_eq!(fs.kind(), BackendKind::Image);
        assert_eq!(fs.kind().to_string(), "image");
        assert_eq!(fs.separator(), "/");
        assert_eq!(fs.root_directories(), vec![fs.root()]);
        assert!(fs.archive_path().is_none());
    }

    #[test]
    fn test_read_only_follows_kind() {
        assert!(image_fs().is_read_only());
        assert!(!directory_fs().is_read_only());

        let writable_image = ModuleFileSystem::new(
            "base",
            "/modules/base",
            Arc::new(MemoryBackend::new()),
            Backing::Image,
            Weak::new(),
        );
        assert!(writable_image.is_read_only());
    }

    #[test]
    fn test_close_is_logical_and_idempotent() {
        let fs = directory_fs();
        assert!(fs.is_open());
        fs.close().unwrap();
        assert!(!fs.is_open());
        fs.close().unwrap();
        assert!(!fs.is_open());
    }
}
