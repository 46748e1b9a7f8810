//! File operations on module paths.
//!
//! Every operation unwraps its [`ModulePath`] operands to backend paths and
//! calls the same primitive on the owning filesystem's backend. Mutating
//! operations are refused up front on read-only filesystems.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::{ModuleFsError, ModuleFsResult};
use crate::filesystem::ModuleFileSystem;
use crate::path::ModulePath;
use crate::vfs::{AccessMode, DirEntry, FileAttr, OpenFlags, SetAttr, StatFs, VfsError, VfsOps};

/// Read-only byte channel over a file in a module.
///
/// Keeps its filesystem alive; reads fail with the backend's closed error
/// once the filesystem's backend is released.
#[derive(Debug)]
pub struct ByteChannel {
    path: ModulePath,
    position: u64,
    size: u64,
}

impl ByteChannel {
    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// File size when the channel was opened.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Read for ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }
        let want = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let data = self
            .path
            .file_system()
            .backend()
            .read(self.path.backend_path(), self.position, want)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ByteChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        self.position = target;
        Ok(target)
    }
}

/// Directory listing whose entries are paths of the listed filesystem.
#[derive(Debug)]
pub struct ModuleDirStream {
    dir: ModulePath,
    entries: std::vec::IntoIter<DirEntry>,
}

impl Iterator for ModuleDirStream {
    type Item = ModulePath;

    fn next(&mut self) -> Option<ModulePath> {
        let entry = self.entries.next()?;
        Some(self.dir.resolve_str(&entry.name))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// Storage statistics of a module filesystem.
#[derive(Debug, Clone)]
pub struct ModuleFileStore {
    name: String,
    read_only: bool,
    stat: StatFs,
}

impl ModuleFileStore {
    pub(crate) fn of(fs: &ModuleFileSystem) -> ModuleFsResult<Self> {
        Ok(Self {
            name: fs.address(),
            read_only: fs.is_read_only(),
            stat: fs.backend().statfs()?,
        })
    }

    /// The filesystem address, `module:/<name>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_type(&self) -> &'static str {
        "modulefs"
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn total_space(&self) -> u64 {
        self.stat.total_space()
    }

    pub fn usable_space(&self) -> u64 {
        self.stat.usable_space()
    }

    pub fn unallocated_space(&self) -> u64 {
        self.stat.unallocated_space()
    }

    /// Raw backend statistics.
    pub fn stat(&self) -> &StatFs {
        &self.stat
    }
}

impl ModulePath {
    fn backend(&self) -> &Arc<dyn VfsOps> {
        self.file_system().backend()
    }

    fn display_path(&self) -> String {
        self.backend_path().display().to_string()
    }

    fn ensure_writable(&self) -> ModuleFsResult<()> {
        let fs = self.file_system();
        if fs.is_read_only() {
            Err(ModuleFsError::ReadOnly(fs.address()))
        } else {
            Ok(())
        }
    }

    fn same_backend(&self, other: &ModulePath) -> bool {
        Arc::ptr_eq(self.backend(), other.backend())
    }

    /// Open a byte channel for reading.
    ///
    /// Only empty or read-only flag sets are accepted.
    pub fn open(&self, flags: OpenFlags) -> ModuleFsResult<ByteChannel> {
        if !flags.is_read_only() {
            return Err(ModuleFsError::UnsupportedOperation(format!(
                "byte channels on {} are read-only",
                self.file_system().address()
            )));
        }

        let attr = self.backend().getattr(self.backend_path())?;
        if attr.is_dir() {
            return Err(VfsError::is_a_directory(self.display_path()).into());
        }
        Ok(ByteChannel {
            path: self.clone(),
            position: 0,
            size: attr.size,
        })
    }

    /// List a directory.
    pub fn read_dir(&self) -> ModuleFsResult<ModuleDirStream> {
        let entries = self.backend().readdir(self.backend_path())?;
        Ok(ModuleDirStream {
            dir: self.clone(),
            entries: entries.into_iter(),
        })
    }

    pub fn metadata(&self) -> ModuleFsResult<FileAttr> {
        Ok(self.backend().getattr(self.backend_path())?)
    }

    pub fn set_attributes(&self, attr: SetAttr) -> ModuleFsResult<FileAttr> {
        self.ensure_writable()?;
        Ok(self.backend().setattr(self.backend_path(), attr)?)
    }

    pub fn exists(&self) -> bool {
        self.backend().exists(self.backend_path())
    }

    pub fn is_dir(&self) -> bool {
        self.metadata().is_ok_and(|attr| attr.is_dir())
    }

    pub fn is_file(&self) -> bool {
        self.metadata().is_ok_and(|attr| attr.is_file())
    }

    /// Read the whole file.
    pub fn read(&self) -> ModuleFsResult<Vec<u8>> {
        Ok(self.backend().read_all(self.backend_path())?)
    }

    pub fn read_to_string(&self) -> ModuleFsResult<String> {
        let bytes = self.read()?;
        String::from_utf8(bytes).map_err(|e| {
            VfsError::Io(io::Error::new(io::ErrorKind::InvalidData, e)).into()
        })
    }

    /// Replace the file's contents, creating it if needed.
    pub fn write(&self, data: impl AsRef<[u8]>) -> ModuleFsResult<()> {
        self.ensure_writable()?;
        Ok(self.backend().write_all(self.backend_path(), data.as_ref())?)
    }

    /// Create an empty file. Fails if it exists.
    pub fn create_file(&self) -> ModuleFsResult<()> {
        self.ensure_writable()?;
        self.backend().create(self.backend_path(), 0o644)?;
        Ok(())
    }

    pub fn create_dir(&self) -> ModuleFsResult<()> {
        self.ensure_writable()?;
        self.backend().mkdir(self.backend_path(), 0o755)?;
        Ok(())
    }

    /// Delete a file or an empty directory.
    pub fn delete(&self) -> ModuleFsResult<()> {
        self.ensure_writable()?;
        let attr = self.backend().getattr(self.backend_path())?;
        if attr.is_dir() {
            self.backend().rmdir(self.backend_path())?;
        } else {
            self.backend().unlink(self.backend_path())?;
        }
        Ok(())
    }

    /// Copy this file to `target`, replacing its contents.
    ///
    /// `target` may live in another module filesystem.
    pub fn copy_to(&self, target: &ModulePath) -> ModuleFsResult<()> {
        target.ensure_writable()?;
        if self.same_backend(target) {
            self.backend().copy(self.backend_path(), target.backend_path())?;
        } else {
            let data = self.read()?;
            target
                .backend()
                .write_all(target.backend_path(), &data)?;
        }
        Ok(())
    }

    /// Move this file or directory to `target`.
    ///
    /// Both paths must share a backend.
    pub fn move_to(&self, target: &ModulePath) -> ModuleFsResult<()> {
        self.ensure_writable()?;
        target.ensure_writable()?;
        if !self.same_backend(target) {
            return Err(VfsError::CrossDeviceLink.into());
        }
        self.backend().rename(self.backend_path(), target.backend_path())?;
        Ok(())
    }

    /// Check that the path exists and permits every mode in `modes`.
    pub fn check_access(&self, modes: &[AccessMode]) -> ModuleFsResult<()> {
        let attr = self.metadata()?;
        for mode in modes {
            let allowed = match mode {
                AccessMode::Read => attr.perm & 0o444 != 0,
                AccessMode::Write => !self.file_system().is_read_only() && attr.perm & 0o222 != 0,
                AccessMode::Execute => attr.perm & 0o111 != 0,
            };
            if !allowed {
                return Err(VfsError::permission_denied(format!(
                    "{} ({mode:?})",
                    self.display_path()
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Returns true if both paths locate the same file.
    ///
    /// Equal paths are the same file without touching the backend; paths on
    /// different backends never are. Otherwise both must exist.
    pub fn is_same_file(&self, other: &ModulePath) -> ModuleFsResult<bool> {
        if self == other {
            return Ok(true);
        }
        if !self.same_backend(other) {
            return Ok(false);
        }
        let a = self.backend().real_path(self.backend_path())?;
        let b = other.backend().real_path(other.backend_path())?;
        Ok(a == b)
    }

    /// Names starting with `.` are hidden.
    pub fn is_hidden(&self) -> bool {
        self.backend_path()
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'))
    }

    /// The file store holding this path. Fails if the path does not exist.
    pub fn file_store(&self) -> ModuleFsResult<ModuleFileStore> {
        if !self.exists() {
            return Err(VfsError::not_found(self.display_path()).into());
        }
        self.file_system().file_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::filesystem::Backing;
    use crate::vfs::MemoryBackend;
    use std::sync::Weak;

    fn image_fs() -> Arc<ModuleFileSystem> {
        ModuleFileSystem::new(
            "base",
            "/modules/base",
            Arc::new(MemoryBackend::read_only_from([
                ("modules/base/com/example/a.txt", "hello module"),
                ("modules/base/com/example/.hidden", ""),
                ("modules/base/com/example/b.txt", "b"),
            ])),
            Backing::Image,
            Weak::new(),
        )
    }

    fn directory_fs() -> Arc<ModuleFileSystem> {
        let backend = MemoryBackend::new();
        backend.mkdir(std::path::Path::new("/com"), 0o755).unwrap();
        backend
            .write_all(std::path::Path::new("/com/a.txt"), b"hello dir")
            .unwrap();
        ModuleFileSystem::new("core", "/", Arc::new(backend), Backing::Directory, Weak::new())
    }

    #[test]
    fn test_byte_channel_reads_and_seeks() {
        let fs = image_fs();
        let mut channel = fs.get_path("com/example/a.txt", &[]).open(OpenFlags::read()).unwrap();
        assert_eq!(channel.size(), 12);

        let mut buf = [0u8; 5];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(channel.position(), 5);

        channel.seek(SeekFrom::End(-6)).unwrap();
        let mut rest = String::new();
        channel.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "module");

        assert!(channel.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_open_rejects_write_flags() {
        for fs in [image_fs(), directory_fs()] {
            let path = fs.root().resolve_str("com");
            let err = path.open(OpenFlags::write()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        }
        let err = image_fs().root().open(OpenFlags::read()).unwrap_err();
        assert!(matches!(err, ModuleFsError::Backend(VfsError::IsADirectory(_))));
    }

    #[test]
    fn test_read_dir_rewraps_entries() {
        let fs = image_fs();
        let dir = fs.get_path("com/example", &[]);
        let entries: Vec<_> = dir.read_dir().unwrap().collect();
        let names: Vec<_> = entries
            .iter()
            .map(|p| p.file_name().unwrap().to_string())
            .collect();
        assert_eq!(names, [".hidden", "a.txt", "b.txt"]);
        assert!(entries.iter().all(|p| p.same_file_system(&dir)));
        assert!(entries[0].is_hidden());
        assert!(!entries[1].is_hidden());
    }

    #[test]
    fn test_read_only_fs_refuses_mutation() {
        let fs = image_fs();
        let path = fs.get_path("com/example/a.txt", &[]);
        for err in [
            path.write("x").unwrap_err(),
            path.delete().unwrap_err(),
            path.create_file().unwrap_err(),
            fs.get_path("new", &[]).create_dir().unwrap_err(),
            path.set_attributes(SetAttr::new().with_perm(0o600)).unwrap_err(),
            path.move_to(&fs.get_path("moved", &[])).unwrap_err(),
            path.copy_to(&fs.get_path("copied", &[])).unwrap_err(),
        ] {
            assert!(matches!(err, ModuleFsError::ReadOnly(ref name) if name == "module:/base"));
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        }
        assert_eq!(path.read_to_string().unwrap(), "hello module");
    }

    #[test]
    fn test_directory_fs_forwards_mutation() {
        let fs = directory_fs();
        let path = fs.get_path("com/b.txt", &[]);
        path.write("written").unwrap();
        assert_eq!(path.read_to_string().unwrap(), "written");

        let dir = fs.get_path("out", &[]);
        dir.create_dir().unwrap();
        assert!(dir.is_dir());

        let moved = dir.resolve_str("b.txt");
        path.move_to(&moved).unwrap();
        assert!(!path.exists());
        assert!(moved.is_file());

        moved.copy_to(&path).unwrap();
        assert_eq!(path.read().unwrap(), b"written");

        moved.delete().unwrap();
        dir.delete().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_copy_across_filesystems() {
        let image = image_fs();
        let dir = directory_fs();
        let target = dir.get_path("copy.txt", &[]);
        image.get_path("com/example/b.txt", &[]).copy_to(&target).unwrap();
        assert_eq!(target.read().unwrap(), b"b");

        let err = target.move_to(&image.get_path("x", &[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);

        let other = directory_fs();
        let err = target.move_to(&other.get_path("x", &[])).unwrap_err();
        assert!(matches!(err, ModuleFsError::Backend(VfsError::CrossDeviceLink)));
    }

    #[test]
    fn test_check_access() {
        let image = image_fs();
        let path = image.get_path("com/example/a.txt", &[]);
        path.check_access(&[AccessMode::Read]).unwrap();
        let err = path.check_access(&[AccessMode::Read, AccessMode::Write]).unwrap_err();
        assert!(matches!(err, ModuleFsError::Backend(VfsError::PermissionDenied(_))));

        let missing = image.get_path("missing", &[]).check_access(&[]).unwrap_err();
        assert!(matches!(missing, ModuleFsError::Backend(ref e) if e.is_not_found()));

        let dir = directory_fs();
        dir.get_path("com/a.txt", &[])
            .check_access(&[AccessMode::Read, AccessMode::Write])
            .unwrap();
    }

    #[test]
    fn test_is_same_file() {
        let fs = image_fs();
        let a = fs.get_path("com/example/a.txt", &[]);
        let dotted = fs.get_path("com/./example/a.txt", &[]);
        assert!(a.is_same_file(&a).unwrap());
        assert!(a.is_same_file(&dotted).unwrap());
        assert!(!a.is_same_file(&fs.get_path("com/example/b.txt", &[])).unwrap());
        assert!(!a.is_same_file(&directory_fs().get_path("com/a.txt", &[])).unwrap());
    }

    #[test]
    fn test_file_store() {
        let fs = image_fs();
        let store = fs.root().file_store().unwrap();
        assert_eq!(store.name(), "module:/base");
        assert_eq!(store.store_type(), "modulefs");
        assert!(store.is_read_only());
        assert!(store.total_space() > 0);
        assert_eq!(store.usable_space(), 0);

        let err = fs.get_path("missing", &[]).file_store().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }
}
