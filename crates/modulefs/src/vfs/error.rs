//! Backend errors.
//!
//! Messages carry the backend-native path, never a `module:` address; the
//! module layer wraps these unchanged.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("filesystem is read-only")]
    ReadOnly,

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// A directory backend was asked for a path outside its root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A whole-file read that does not fit one request.
    #[error("file too large: {0}")]
    TooLarge(String),

    /// Rename between two backends.
    #[error("cross-device link")]
    CrossDeviceLink,

    /// The backend was closed; every later call fails with this.
    #[error("backend is closed")]
    Closed,

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Missing entries surface differently per backend; this folds them.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) | VfsError::Archive(zip::result::ZipError::FileNotFound) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            VfsError::PermissionDenied(_) | VfsError::PathEscapesRoot(_) => {
                io::ErrorKind::PermissionDenied
            }
            VfsError::ReadOnly => io::ErrorKind::ReadOnlyFilesystem,
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            VfsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            VfsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            VfsError::TooLarge(_) => io::ErrorKind::FileTooLarge,
            VfsError::CrossDeviceLink => io::ErrorKind::CrossesDevices,
            VfsError::Closed => io::ErrorKind::BrokenPipe,
            VfsError::Archive(_) | VfsError::Io(_) => io::ErrorKind::Other,
        }
    }
}

/// Lets `Read`/`Seek` adapters surface backend errors.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion_keeps_kind() {
        let err: io::Error = VfsError::Closed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let err: io::Error = VfsError::not_found("/a").into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("/a"));

        let inner = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let err: io::Error = VfsError::Io(inner).into();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_not_found_folds_backend_shapes() {
        assert!(VfsError::not_found("/x").is_not_found());
        assert!(VfsError::Io(io::Error::from(io::ErrorKind::NotFound)).is_not_found());
        assert!(VfsError::Archive(zip::result::ZipError::FileNotFound).is_not_found());
        assert!(!VfsError::Closed.is_not_found());
    }
}
