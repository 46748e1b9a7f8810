//! Native backend operations trait.
//!
//! Every backend behind a module filesystem (archive, module image,
//! directory) implements this trait. The module layer never touches bytes
//! itself; it unwraps module paths and forwards to these primitives.

use std::path::{Path, PathBuf};

use super::types::{DirEntry, FileAttr, SetAttr, StatFs};
use super::VfsResult;

/// Core backend operations.
///
/// All operations are path-based and blocking. Paths live in the backend's
/// own namespace: `/`-rooted, with a leading slash optional.
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if EOF is reached.
    fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Resolve symlinks and `..`, returning the canonical backend path.
    ///
    /// Fails if the path does not exist.
    fn real_path(&self, path: &Path) -> VfsResult<PathBuf>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset`, returning the number of bytes written.
    fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Create a new, empty file.
    fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Create a new directory.
    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Remove a file.
    fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory.
    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Truncate a file to the specified size.
    fn truncate(&self, path: &Path, size: u64) -> VfsResult<()>;

    /// Set file attributes.
    fn setattr(&self, path: &Path, attr: SetAttr) -> VfsResult<FileAttr>;

    // ========================================================================
    // Metadata and lifecycle
    // ========================================================================

    /// Returns true if this backend is read-only.
    fn read_only(&self) -> bool;

    /// Get filesystem statistics.
    fn statfs(&self) -> VfsResult<StatFs>;

    /// Release the backend's underlying resources.
    ///
    /// Later operations fail with [`VfsError::Closed`](super::VfsError::Closed).
    fn close(&self) -> VfsResult<()> {
        Ok(())
    }

    /// Returns false once [`close`](Self::close) has run.
    fn is_open(&self) -> bool {
        true
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool {
        self.getattr(path).is_ok()
    }

    /// Read entire file contents.
    fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path)?;
        if attr.is_dir() {
            return Err(super::VfsError::is_a_directory(path.display().to_string()));
        }
        let size = u32::try_from(attr.size)
            .map_err(|_| super::VfsError::TooLarge(path.display().to_string()))?;
        self.read(path, 0, size)
    }

    /// Write entire file contents, creating or truncating the file.
    fn write_all(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        if self.exists(path) {
            self.truncate(path, 0)?;
        } else {
            self.create(path, 0o644)?;
        }
        self.write(path, 0, data)?;
        Ok(())
    }

    /// Copy a file's contents to a new location.
    fn copy(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let data = self.read_all(from)?;
        self.write_all(to, &data)
    }
}
