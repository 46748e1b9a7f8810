//! Native backend providers.
//!
//! The module layer delegates every filesystem primitive to one of these.
//! Key components:
//!
//! - [`VfsOps`] - Core trait for backend operations
//! - [`LocalBackend`] - Exploded module directories (with path security)
//! - [`ZipBackend`] - Module archives, always read-only
//! - [`MemoryBackend`] - In-memory store, usable as the module image
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use `/`-rooted paths in the
//!   backend's own namespace.
//! - **Explicit offset/size**: Reads take offset and size, so byte channels
//!   can be layered on top without backend handle state.
//! - **Blocking**: Every call runs on the caller's thread.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::{LocalBackend, MemoryBackend, ZipBackend};
pub use error::{VfsError, VfsResult};
pub use ops::VfsOps;
pub use types::{AccessMode, DirEntry, FileAttr, FileType, OpenFlags, SetAttr, StatFs};
