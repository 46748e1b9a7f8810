//! Directory backend for exploded modules.
//!
//! Backend paths are `/`-rooted inside the module directory. Every path is
//! canonicalized and must stay under the root, so `..` and symlinks cannot
//! reach the rest of the host.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, SetAttr, StatFs};

/// A module directory on the host.
///
/// With root `/opt/app/mods/com.example.core`, `read("/com/example/a.txt")`
/// reads `/opt/app/mods/com.example.core/com/example/a.txt`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// A writable backend. The root is canonicalized up front so the
    /// containment check compares like with like.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Used for an on-disk module image.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        let mut backend = Self::new(root);
        backend.read_only = true;
        backend
    }

    /// Read-only exactly when the module directory itself is.
    pub fn with_native_permissions(root: impl Into<PathBuf>) -> Self {
        let mut backend = Self::new(root);
        backend.read_only = fs::metadata(&backend.root)
            .map(|meta| meta.permissions().readonly())
            .unwrap_or(false);
        backend
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a backend path, refusing anything outside the root.
    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let path = path.strip_prefix("/").unwrap_or(path);

        if path.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }

        let full = self.root.join(path);

        // A path about to be created has no canonical form; check its parent.
        let canonical = if full.exists() {
            dunce::canonicalize(&full)?
        } else {
            let parent = full.parent().ok_or_else(|| VfsError::invalid_path("no parent"))?;
            let filename = full
                .file_name()
                .ok_or_else(|| VfsError::invalid_path("no filename"))?;

            if parent.exists() {
                dunce::canonicalize(parent)?.join(filename)
            } else if path.components().any(|c| matches!(c, Component::ParentDir)) {
                return Err(VfsError::path_escapes_root(path.display().to_string()));
            } else {
                full
            }
        };

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    fn to_backend_path(&self, full: &Path) -> VfsResult<PathBuf> {
        let relative = full
            .strip_prefix(&self.root)
            .map_err(|_| VfsError::path_escapes_root(full.display().to_string()))?;
        Ok(Path::new("/").join(relative))
    }

    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn kind_of(file_type: fs::FileType) -> FileType {
        if file_type.is_dir() {
            FileType::Directory
        } else if file_type.is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        }
    }

    fn metadata_to_attr(meta: &fs::Metadata) -> FileAttr {
        FileAttr {
            size: meta.len(),
            kind: Self::kind_of(meta.file_type()),
            perm: meta.permissions().mode(),
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            atime: meta.accessed().ok(),
            nlink: meta.nlink() as u32,
        }
    }
}

impl VfsOps for LocalBackend {
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full_path)?;
        Ok(Self::metadata_to_attr(&meta))
    }

    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let mut entries = fs::read_dir(self.resolve(path)?)?
            .map(|entry| -> VfsResult<DirEntry> {
                let entry = entry?;
                Ok(DirEntry::new(
                    entry.file_name().to_string_lossy(),
                    Self::kind_of(entry.file_type()?),
                ))
            })
            .collect::<VfsResult<Vec<_>>>()?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let full_path = self.resolve(path)?;
        let mut file = fs::File::open(&full_path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = Vec::with_capacity(size as usize);
        file.take(u64::from(size)).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        let relative = path.strip_prefix("/").unwrap_or(path);
        let canonical = dunce::canonicalize(self.root.join(relative))?;

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::permission_denied(format!(
                "path escapes directory root: {}",
                path.display()
            )));
        }

        self.to_backend_path(&canonical)
    }

    fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let mut file = fs::OpenOptions::new().write(true).open(&full_path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        Ok(data.len() as u32)
    }

    fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        use std::os::unix::fs::OpenOptionsExt;

        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&full_path)?;

        let meta = file.metadata()?;
        Ok(Self::metadata_to_attr(&meta))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        use std::os::unix::fs::DirBuilderExt;

        self.check_writable()?;
        let full_path = self.resolve(path)?;

        fs::DirBuilder::new().mode(mode).create(&full_path)?;

        let meta = fs::metadata(&full_path)?;
        Ok(Self::metadata_to_attr(&meta))
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        Ok(fs::remove_file(&full_path)?)
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove backend root"));
        }
        Ok(fs::remove_dir(&full_path)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        Ok(fs::rename(&from_path, &to_path)?)
    }

    fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new().write(true).open(&full_path)?;
        Ok(file.set_len(size)?)
    }

    fn setattr(&self, path: &Path, attr: SetAttr) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        if let Some(size) = attr.size {
            let file = fs::OpenOptions::new().write(true).open(&full_path)?;
            file.set_len(size)?;
        }

        if let Some(perm) = attr.perm {
            fs::set_permissions(&full_path, fs::Permissions::from_mode(perm))?;
        }

        if attr.mtime.is_some() || attr.atime.is_some() {
            let file = fs::File::options().write(true).open(&full_path)?;
            let mut times = fs::FileTimes::new();
            if let Some(mtime) = attr.mtime {
                times = times.set_modified(mtime);
            }
            if let Some(atime) = attr.atime {
                times = times.set_accessed(atime);
            }
            file.set_times(times)?;
        }

        self.getattr(path)
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    /// Statistics of the host filesystem holding the module directory.
    fn statfs(&self) -> VfsResult<StatFs> {
        let stat = rustix::fs::statvfs(&self.root).map_err(|e| VfsError::Io(e.into()))?;
        Ok(StatFs {
            blocks: stat.f_blocks,
            bfree: stat.f_bfree,
            bavail: stat.f_bavail,
            files: stat.f_files,
            frsize: stat.f_frsize as u32,
        })
    }
}
