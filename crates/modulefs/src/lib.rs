//! # modulefs
//!
//! Virtual filesystems over modules.
//!
//! A module is a named unit of packaged resources. Its bytes may live in a
//! zip-style archive, in the platform module image, or in a plain directory.
//! Callers address module content as `module:/<name>[/<path>]` and never
//! need to know which of the three stores holds it.
//!
//! ```text
//! address ─▶ uri (validate) ─▶ layer (resolve location)
//!         ─▶ backend (image │ archive │ directory) ─▶ registry
//!         ─▶ ModulePath ─▶ files (delegate to VfsOps)
//! ```
//!
//! Archive-backed filesystems that resolve to the same archive file share
//! one open archive through [`SharedArchiveHandles`]; the archive is closed
//! when the last of them closes.

pub mod archives;
mod backend;
pub mod config;
pub mod error;
pub mod files;
pub mod filesystem;
pub mod image;
pub mod layer;
pub mod matcher;
pub mod path;
pub mod provider;
pub mod registry;
pub mod uri;
pub mod vfs;

pub use archives::{ArchiveOpener, SharedArchiveHandles, ZipOpener};
pub use config::{FetchPolicy, ModuleFsConfig};
pub use error::{ErrorKind, ModuleFsError, ModuleFsResult};
pub use files::{ByteChannel, ModuleDirStream, ModuleFileStore};
pub use filesystem::{BackendKind, ModuleFileSystem};
pub use image::ImageStore;
pub use layer::{resolve_location, resolve_module, ModuleGraph, ModuleLayer, ModuleRef};
pub use matcher::PathMatcher;
pub use path::ModulePath;
pub use provider::{ModuleFsProvider, ModuleFsProviderBuilder, NewFsOptions};
pub use registry::FileSystemRegistry;
pub use uri::{ModuleAddress, Uri, MODULE_SCHEME};
pub use vfs::{
    backends::{LocalBackend, MemoryBackend, ZipBackend},
    AccessMode, DirEntry, FileAttr, FileType, OpenFlags, SetAttr, StatFs, VfsError, VfsOps,
    VfsResult,
};
