//! Shapes shared by every backend.
//!
//! Path based, no inodes. The module layer forwards these untouched, so a
//! caller sees the same metadata whichever store holds the module.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    /// Only reported by directory backends.
    Symlink,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// Metadata of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    pub size: u64,
    pub kind: FileType,
    /// Unix permission bits.
    pub perm: u32,
    pub mtime: SystemTime,
    /// `None` when the store does not track access times.
    pub atime: Option<SystemTime>,
    pub nlink: u32,
}

impl FileAttr {
    pub fn file(size: u64, perm: u32) -> Self {
        Self::with_mtime(FileType::File, size, perm, SystemTime::now())
    }

    pub fn directory(perm: u32) -> Self {
        let mut attr = Self::with_mtime(FileType::Directory, 0, perm, SystemTime::now());
        attr.nlink = 2;
        attr
    }

    pub fn with_mtime(kind: FileType, size: u64, perm: u32, mtime: SystemTime) -> Self {
        Self {
            size,
            kind,
            perm,
            mtime,
            atime: None,
            nlink: 1,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// One name in a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Attribute changes for `setattr`; `None` leaves a field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetAttr {
    pub size: Option<u64>,
    pub mtime: Option<SystemTime>,
    pub atime: Option<SystemTime>,
    pub perm: Option<u32>,
}

impl SetAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_perm(mut self, perm: u32) -> Self {
        self.perm = Some(perm);
        self
    }
}

/// Space statistics of a backend, in `frsize` blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    /// Free blocks available to unprivileged callers.
    pub bavail: u64,
    pub files: u64,
    pub frsize: u32,
}

impl StatFs {
    /// A full store holding `bytes` in `files` entries, as archives and
    /// images are.
    pub fn fixed(bytes: u64, files: u64) -> Self {
        let frsize = 4096u32;
        Self {
            blocks: bytes.div_ceil(u64::from(frsize)),
            bfree: 0,
            bavail: 0,
            files,
            frsize,
        }
    }

    pub fn total_space(&self) -> u64 {
        self.blocks * u64::from(self.frsize)
    }

    pub fn usable_space(&self) -> u64 {
        self.bavail * u64::from(self.frsize)
    }

    pub fn unallocated_space(&self) -> u64 {
        self.bfree * u64::from(self.frsize)
    }
}

/// How a byte channel is opened.
///
/// Module content is only ever read through channels, so anything other
/// than [`OpenFlags::read`] is refused by the module layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
}

impl OpenFlags {
    pub fn read() -> Self {
        Self::default()
    }

    pub fn write() -> Self {
        Self {
            write: true,
            ..Self::default()
        }
    }

    pub fn is_read_only(&self) -> bool {
        !(self.write || self.append || self.create || self.truncate)
    }
}

/// Access modes for [`ModulePath::check_access`](crate::ModulePath::check_access).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_attr_counts_links() {
        let dir = FileAttr::directory(0o755);
        assert!(dir.is_dir());
        assert_eq!(dir.nlink, 2);
        assert_eq!(FileAttr::file(3, 0o444).nlink, 1);
    }

    #[test]
    fn test_open_flags() {
        assert!(OpenFlags::read().is_read_only());
        assert!(!OpenFlags::write().is_read_only());
        let append = OpenFlags {
            append: true,
            ..OpenFlags::read()
        };
        assert!(!append.is_read_only());
    }

    #[test]
    fn test_fixed_statfs_has_no_free_space() {
        let stat = StatFs::fixed(10_000, 3);
        assert_eq!(stat.blocks, 3);
        assert_eq!(stat.total_space(), 3 * 4096);
        assert_eq!(stat.usable_space(), 0);
        assert_eq!(stat.unallocated_space(), 0);
    }
}
