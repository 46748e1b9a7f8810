//! Zip archive backend.
//!
//! Serves the contents of a module archive (`.jar`/`.zip`). The archive file
//! is opened for reading only and every mutating operation fails with
//! [`VfsError::ReadOnly`], whatever the archive file's own permissions are.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use zip::ZipArchive;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, SetAttr, StatFs};

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    /// Position in the central directory; `None` for implied directories.
    index: Option<usize>,
    kind: FileType,
    size: u64,
    perm: u32,
}

/// Read-only backend over a zip archive.
///
/// The central directory is indexed once at open time. File reads go back to
/// the archive under a mutex, since a `ZipArchive` needs `&mut` to decompress.
pub struct ZipBackend {
    archive_path: PathBuf,
    entries: BTreeMap<PathBuf, IndexEntry>,
    archive_len: u64,
    mtime: SystemTime,
    archive: Mutex<Option<ZipArchive<File>>>,
}

impl std::fmt::Debug for ZipBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipBackend")
            .field("archive_path", &self.archive_path)
            .field("entries", &self.entries.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl ZipBackend {
    /// Open an archive read-only and index its entries.
    pub fn open(archive_path: impl Into<PathBuf>) -> VfsResult<Self> {
        let archive_path = archive_path.into();
        let file = File::open(&archive_path)?;
        let meta = file.metadata()?;
        let mut archive = ZipArchive::new(file)?;

        let mut entries = BTreeMap::new();
        entries.insert(
            PathBuf::new(),
            IndexEntry {
                index: None,
                kind: FileType::Directory,
                size: 0,
                perm: 0o555,
            },
        );

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            // Entries with absolute or `..` names are never reachable.
            let Some(name) = file.enclosed_name() else {
                continue;
            };
            let name = Self::normalize(&name);
            if name.as_os_str().is_empty() {
                continue;
            }

            let kind = if file.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            };
            let default_perm = if kind.is_dir() { 0o555 } else { 0o444 };
            let perm = file.unix_mode().map(|m| m & 0o555).unwrap_or(default_perm);

            Self::imply_parents(&mut entries, &name);
            entries.insert(
                name,
                IndexEntry {
                    index: Some(i),
                    kind,
                    size: file.size(),
                    perm,
                },
            );
        }

        Ok(Self {
            archive_path,
            entries,
            archive_len: meta.len(),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            archive: Mutex::new(Some(archive)),
        })
    }

    /// Path of the archive file on disk.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    result.pop();
                }
                Component::Normal(s) => result.push(s),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        result
    }

    fn imply_parents(entries: &mut BTreeMap<PathBuf, IndexEntry>, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            current.push(component);
            entries.entry(current.clone()).or_insert(IndexEntry {
                index: None,
                kind: FileType::Directory,
                size: 0,
                perm: 0o555,
            });
        }
    }

    fn check_open(&self) -> VfsResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(VfsError::Closed)
        }
    }

    fn lookup(&self, path: &Path) -> VfsResult<(PathBuf, IndexEntry)> {
        self.check_open()?;
        let normalized = Self::normalize(path);
        match self.entries.get(&normalized) {
            Some(entry) => Ok((normalized, *entry)),
            None => Err(VfsError::not_found(format!("/{}", normalized.display()))),
        }
    }
}

impl VfsOps for ZipBackend {
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let (_, entry) = self.lookup(path)?;
        let mut attr = FileAttr::with_mtime(entry.kind, entry.size, entry.perm, self.mtime);
        if entry.kind.is_dir() {
            attr.nlink = 2;
        }
        Ok(attr)
    }

    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let (normalized, entry) = self.lookup(path)?;
        if !entry.kind.is_dir() {
            return Err(VfsError::not_a_directory(format!("/{}", normalized.display())));
        }

        Ok(self
            .entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(normalized.as_path()))
            .filter_map(|(p, e)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some(DirEntry::new(name, e.kind))
            })
            .collect())
    }

    fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let (normalized, entry) = self.lookup(path)?;
        let Some(index) = entry.index.filter(|_| entry.kind.is_file()) else {
            return Err(VfsError::is_a_directory(format!("/{}", normalized.display())));
        };

        let mut guard = self.archive.lock();
        let archive = guard.as_mut().ok_or(VfsError::Closed)?;
        let mut file = archive.by_index(index)?;

        // Compressed entries cannot seek; skip forward instead.
        io::copy(&mut (&mut file).take(offset), &mut io::sink())?;
        let mut buffer = Vec::with_capacity(size.min(64 * 1024) as usize);
        (&mut file).take(u64::from(size)).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        let (normalized, _) = self.lookup(path)?;
        Ok(Path::new("/").join(normalized))
    }

    fn write(&self, _path: &Path, _offset: u64, _data: &[u8]) -> VfsResult<u32> {
        Err(VfsError::ReadOnly)
    }

    fn create(&self, _path: &Path, _mode: u32) -> VfsResult<FileAttr> {
        Err(VfsError::ReadOnly)
    }

    fn mkdir(&self, _path: &Path, _mode: u32) -> VfsResult<FileAttr> {
        Err(VfsError::ReadOnly)
    }

    fn unlink(&self, _path: &Path) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    fn rmdir(&self, _path: &Path) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    fn rename(&self, _from: &Path, _to: &Path) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    fn truncate(&self, _path: &Path, _size: u64) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    fn setattr(&self, _path: &Path, _attr: SetAttr) -> VfsResult<FileAttr> {
        Err(VfsError::ReadOnly)
    }

    fn read_only(&self) -> bool {
        true
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        self.check_open()?;
        Ok(StatFs::fixed(self.archive_len, self.entries.len() as u64))
    }

    fn close(&self) -> VfsResult<()> {
        self.archive.lock().take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.archive.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_archive(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("mod.jar");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        writer.add_directory("com/example/", options).unwrap();
        writer.start_file("com/example/hello.txt", options).unwrap();
        writer.write_all(b"hello archive").unwrap();
        // No explicit directory entry for `assets/`.
        writer.start_file("assets/logo.svg", options).unwrap();
        writer.write_all(b"<svg/>").unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_read_entry() {
        let dir = TempDir::new().unwrap();
        let backend = ZipBackend::open(build_archive(&dir)).unwrap();

        let data = backend.read_all(Path::new("/com/example/hello.txt")).unwrap();
        assert_eq!(data, b"hello archive");
        assert_eq!(
            backend.read(Path::new("com/example/hello.txt"), 6, 3).unwrap(),
            b"arc"
        );
    }

    #[test]
    fn test_implied_directories() {
        let dir = TempDir::new().unwrap();
        let backend = ZipBackend::open(build_archive(&dir)).unwrap();

        let root: Vec<_> = backend
            .readdir(Path::new("/"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(root, vec!["assets", "com"]);
        assert!(backend.getattr(Path::new("/assets")).unwrap().is_dir());
    }

    #[test]
    fn test_always_read_only() {
        let dir = TempDir::new().unwrap();
        let backend = ZipBackend::open(build_archive(&dir)).unwrap();

        assert!(backend.read_only());
        assert!(matches!(
            backend.write_all(Path::new("/new.txt"), b"x"),
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(
            backend.unlink(Path::new("/com/example/hello.txt")),
            Err(VfsError::ReadOnly)
        ));
    }

    #[test]
    fn test_closed_backend_fails() {
        let dir = TempDir::new().unwrap();
        let backend = ZipBackend::open(build_archive(&dir)).unwrap();

        backend.close().unwrap();
        assert!(!backend.is_open());
        assert!(matches!(
            backend.read_all(Path::new("/com/example/hello.txt")),
            Err(VfsError::Closed)
        ));
    }

    #[test]
    fn test_missing_entry() {
        let dir = TempDir::new().unwrap();
        let backend = ZipBackend::open(build_archive(&dir)).unwrap();
        let err = backend.getattr(Path::new("/nope.txt")).unwrap_err();
        assert!(err.is_not_found());
    }
}
