//! Module image store.
//!
//! The platform module image is a single store holding every image module
//! under `/modules/<name>`. A provider opens it at most once and hands the
//! same backend to every image-backed filesystem. It is never released.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::error::{ModuleFsError, ModuleFsResult};
use crate::vfs::{LocalBackend, VfsOps};

/// Lazily opened, shared module image.
pub struct ImageStore {
    root: Option<PathBuf>,
    backend: Mutex<Option<Arc<dyn VfsOps>>>,
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("root", &self.root)
            .field("open", &self.is_open())
            .finish()
    }
}

impl ImageStore {
    /// An image opened from `root` on first use.
    pub fn from_root(root: Option<PathBuf>) -> Self {
        Self {
            root,
            backend: Mutex::new(None),
        }
    }

    /// An image served by an already-open backend.
    pub fn with_backend(backend: Arc<dyn VfsOps>) -> Self {
        Self {
            root: None,
            backend: Mutex::new(Some(backend)),
        }
    }

    /// Return the image backend, opening it on first call.
    pub fn open(&self) -> ModuleFsResult<Arc<dyn VfsOps>> {
        let mut backend = self.backend.lock();
        if let Some(existing) = backend.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let root = self
            .root
            .as_ref()
            .ok_or_else(|| ModuleFsError::Config("no module image configured".to_string()))?;
        if !root.is_dir() {
            return Err(ModuleFsError::Config(format!(
                "module image {} is not a directory",
                root.display()
            )));
        }

        let opened: Arc<dyn VfsOps> = Arc::new(LocalBackend::read_only(root));
        info!(root = %root.display(), "opened module image");
        *backend = Some(Arc::clone(&opened));
        Ok(opened)
    }

    /// Returns true once the image has been opened.
    pub fn is_open(&self) -> bool {
        self.backend.lock().is_some()
    }

    /// Base path of `module` inside the image.
    pub fn module_base(module: &str) -> PathBuf {
        Path::new("/modules").join(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;

    #[test]
    fn test_injected_backend_is_shared() {
        let image = ImageStore::with_backend(Arc::new(MemoryBackend::read_only_from([(
            "modules/base/a.txt",
            "a",
        )])));
        let first = image.open().unwrap();
        let second = image.open().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.read_all(Path::new("/modules/base/a.txt")).unwrap(), b"a");
    }

    #[test]
    fn test_opens_root_lazily_read_only() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("modules/base")).unwrap();
        std::fs::write(dir.path().join("modules/base/a.txt"), "a").unwrap();

        let image = ImageStore::from_root(Some(dir.path().to_path_buf()));
        assert!(!image.is_open());

        let backend = image.open().unwrap();
        assert!(image.is_open());
        assert!(backend.read_only());
        assert!(backend.exists(&ImageStore::module_base("base").join("a.txt")));
    }

    #[test]
    fn test_unconfigured_image() {
        let image = ImageStore::from_root(None);
        assert!(matches!(image.open(), Err(ModuleFsError::Config(_))));
    }

    #[test]
    fn test_module_base() {
        assert_eq!(ImageStore::module_base("java.base"), Path::new("/modules/java.base"));
    }
}
