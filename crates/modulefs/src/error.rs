//! Module filesystem errors.

use std::io;
use thiserror::Error;

use crate::vfs::VfsError;

/// Broad category of a [`ModuleFsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Caller supplied something unusable (address, location, backend type).
    IllegalArgument,
    /// Module or filesystem not found.
    NotFound,
    /// Operation not permitted on this filesystem.
    UnsupportedOperation,
    /// Paths from different filesystems were combined.
    ProviderMismatch,
    /// Failure raised by the native backend, carried unchanged.
    Backend,
}

/// Module filesystem error type.
#[derive(Debug, Error)]
pub enum ModuleFsError {
    /// Address does not follow the `module:/<name>` grammar.
    #[error("invalid module address {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: &'static str },

    /// Module is absent from the configuration graph and all its ancestors.
    #[error("module {0} was not resolved")]
    ModuleNotFound(String),

    /// Module exists but declares no physical location.
    #[error("location of module {0} is unknown")]
    UnresolvedLocation(String),

    /// No backend claimed the physical location.
    #[error("unsupported module file system type {0}")]
    UnsupportedBackend(String),

    /// No open filesystem registered for the module.
    #[error("no open file system for module {0}")]
    FileSystemNotFound(String),

    /// Mutating call against an archive- or image-backed filesystem.
    #[error("module file system {0} is read-only")]
    ReadOnly(String),

    /// Operation not supported at this layer.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Path arguments cannot be combined (e.g. relativizing an absolute
    /// path against a relative one).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Path matcher syntax or pattern is malformed.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(String),

    /// Path belongs to a different module filesystem.
    #[error("path belongs to a different module file system")]
    ProviderMismatch,

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Native backend failure.
    #[error(transparent)]
    Backend(#[from] VfsError),
}

impl ModuleFsError {
    pub(crate) fn invalid_uri(uri: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason,
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModuleFsError::InvalidUri { .. }
            | ModuleFsError::UnresolvedLocation(_)
            | ModuleFsError::UnsupportedBackend(_)
            | ModuleFsError::InvalidPath(_)
            | ModuleFsError::InvalidPattern(_)
            | ModuleFsError::Config(_) => ErrorKind::IllegalArgument,
            ModuleFsError::ModuleNotFound(_) | ModuleFsError::FileSystemNotFound(_) => {
                ErrorKind::NotFound
            }
            ModuleFsError::ReadOnly(_) | ModuleFsError::UnsupportedOperation(_) => {
                ErrorKind::UnsupportedOperation
            }
            ModuleFsError::ProviderMismatch => ErrorKind::ProviderMismatch,
            ModuleFsError::Backend(_) => ErrorKind::Backend,
        }
    }
}

impl From<ron::error::SpannedError> for ModuleFsError {
    fn from(e: ron::error::SpannedError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<io::Error> for ModuleFsError {
    fn from(e: io::Error) -> Self {
        Self::Backend(VfsError::Io(e))
    }
}

/// Convert ModuleFsError to std::io::Error for compatibility.
impl From<ModuleFsError> for io::Error {
    fn from(e: ModuleFsError) -> Self {
        match e {
            ModuleFsError::Backend(e) => e.into(),
            ModuleFsError::ModuleNotFound(_) | ModuleFsError::FileSystemNotFound(_) => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            ModuleFsError::ReadOnly(_) => {
                io::Error::new(io::ErrorKind::ReadOnlyFilesystem, e.to_string())
            }
            ModuleFsError::UnsupportedOperation(_) => {
                io::Error::new(io::ErrorKind::Unsupported, e.to_string())
            }
            other => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}

/// Module filesystem result type.
pub type ModuleFsResult<T> = Result<T, ModuleFsError>;
