//! Native backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) for the physical stores a
//! module can live in.

mod archive;
mod local;
mod memory;

pub use archive::ZipBackend;
pub use local::LocalBackend;
pub use memory::MemoryBackend;
