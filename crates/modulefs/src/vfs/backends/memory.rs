//! In-memory backend.
//!
//! Used as an injectable module image store and in tests. All data is
//! ephemeral.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, SetAttr, StatFs};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } | Entry::Directory { attr } => attr,
        }
    }

    fn attr_mut(&mut self) -> &mut FileAttr {
        match self {
            Entry::File { attr, .. } | Entry::Directory { attr } => attr,
        }
    }
}

/// In-memory backend.
///
/// Thread-safe via internal `RwLock`. Keys are normalized paths without a
/// leading slash; the empty path is the root directory.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<PathBuf, Entry>>,
    read_only: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            PathBuf::new(),
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            entries: RwLock::new(entries),
            read_only: false,
        }
    }

    /// Create a read-only store holding the given files.
    ///
    /// Parent directories are created implicitly.
    pub fn read_only_from<I, P, D>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<Path>,
        D: Into<Vec<u8>>,
    {
        let mut backend = Self::new();
        {
            let mut entries = backend.entries.write();
            for (path, data) in files {
                let path = Self::normalize(path.as_ref());
                Self::ensure_parents(&mut entries, &path);
                let data = data.into();
                let attr = FileAttr::file(data.len() as u64, 0o444);
                entries.insert(path, Entry::File { data, attr });
            }
        }
        backend.read_only = true;
        backend
    }

    /// Normalize a path: remove leading `/`, resolve `.` and `..`.
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

    fn ensure_parents(entries: &mut BTreeMap<PathBuf, Entry>, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let Component::Normal(s) = component {
                current.push(s);
                entries.entry(current.clone()).or_insert(Entry::Directory {
                    attr: FileAttr::directory(0o755),
                });
            }
        }
    }

    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn require_parent_dir(entries: &BTreeMap<PathBuf, Entry>, path: &Path) -> VfsResult<()> {
        let parent = path.parent().unwrap_or(Path::new(""));
        match entries.get(parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(Entry::File { .. }) => Err(VfsError::not_a_directory(parent.display().to_string())),
            None => Err(VfsError::not_found(parent.display().to_string())),
        }
    }

    fn path_str(path: &Path) -> String {
        format!("/{}", path.display())
    }
}

impl VfsOps for MemoryBackend {
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        self.entries
            .read()
            .get(&normalized)
            .map(|e| e.attr().clone())
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))
    }

    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(VfsError::not_a_directory(Self::path_str(&normalized)));
            }
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        // BTreeMap iteration keeps the listing sorted.
        Ok(entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(normalized.as_path()))
            .filter_map(|(p, e)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some(DirEntry::new(name, e.attr().kind))
            })
            .collect())
    }

    fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = start.saturating_add(size as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        let normalized = Self::normalize(path);
        if self.entries.read().contains_key(&normalized) {
            Ok(Path::new("/").join(normalized))
        } else {
            Err(VfsError::not_found(Self::path_str(&normalized)))
        }
    }

    fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        self.check_writable()?;
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        match entries.get_mut(&normalized) {
            Some(Entry::File { data: content, attr }) => {
                let offset = offset as usize;
                let end = offset + data.len();
                if content.len() < end {
                    content.resize(end, 0);
                }
                content[offset..end].copy_from_slice(data);
                attr.size = content.len() as u64;
                attr.mtime = SystemTime::now();
                Ok(data.len() as u32)
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(Self::path_str(&normalized)));
        }
        Self::require_parent_dir(&entries, &normalized)?;

        let attr = FileAttr::file(0, mode);
        entries.insert(
            normalized,
            Entry::File {
                data: Vec::new(),
                attr: attr.clone(),
            },
        );
        Ok(attr)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(Self::path_str(&normalized)));
        }
        Self::require_parent_dir(&entries, &normalized)?;

        let attr = FileAttr::directory(mode);
        entries.insert(normalized, Entry::Directory { attr: attr.clone() });
        Ok(attr)
    }

    fn unlink(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        match entries.get(&normalized) {
            Some(Entry::File { .. }) => {
                entries.remove(&normalized);
                Ok(())
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    fn rmdir(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let normalized = Self::normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }
        let mut entries = self.entries.write();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {
                if entries.keys().any(|p| p.parent() == Some(normalized.as_path())) {
                    return Err(VfsError::directory_not_empty(Self::path_str(&normalized)));
                }
                entries.remove(&normalized);
                Ok(())
            }
            Some(Entry::File { .. }) => {
                Err(VfsError::not_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let from = Self::normalize(from);
        let to = Self::normalize(to);
        let mut entries = self.entries.write();

        if !entries.contains_key(&from) {
            return Err(VfsError::not_found(Self::path_str(&from)));
        }
        Self::require_parent_dir(&entries, &to)?;

        // Move the entry and everything beneath it.
        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|p| p.starts_with(&from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let suffix = old.strip_prefix(&from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                entries.insert(new, entry);
            }
        }
        Ok(())
    }

    fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        self.setattr(path, SetAttr::new().with_size(size)).map(|_| ())
    }

    fn setattr(&self, path: &Path, attr: SetAttr) -> VfsResult<FileAttr> {
        self.check_writable()?;
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        let entry = entries
            .get_mut(&normalized)
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))?;

        if let Some(size) = attr.size {
            match &mut *entry {
                Entry::File { data, attr } => {
                    data.resize(size as usize, 0);
                    attr.size = size;
                }
                Entry::Directory { .. } => {
                    return Err(VfsError::is_a_directory(Self::path_str(&normalized)));
                }
            }
        }

        let current = entry.attr_mut();
        if let Some(perm) = attr.perm {
            current.perm = perm;
        }
        if let Some(mtime) = attr.mtime {
            current.mtime = mtime;
        }
        if let Some(atime) = attr.atime {
            current.atime = Some(atime);
        }
        Ok(current.clone())
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        let entries = self.entries.read();
        let bytes = entries
            .values()
            .map(|e| match e {
                Entry::File { data, .. } => data.len() as u64,
                Entry::Directory { .. } => 0,
            })
            .sum();
        Ok(StatFs::fixed(bytes, entries.len() as u64))
    }
}
