//! Filesystem registry.
//!
//! Maps module names to their open filesystem. An entry is assumed open;
//! the first lookup that finds it closed evicts it.
//!
//! Lock discipline: construction runs under the registry lock, so at most
//! one filesystem is built per module name even under a race. Constructing
//! an archive filesystem takes the archive table lock inside it; nothing
//! takes the two in the other order. Evicted or replaced filesystems are
//! dropped after the registry lock is released, because dropping the last
//! reference releases an archive handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ModuleFsError, ModuleFsResult};
use crate::filesystem::ModuleFileSystem;

/// Registry of open module filesystems, keyed by module name.
pub struct FileSystemRegistry {
    entries: Mutex<HashMap<String, Arc<ModuleFileSystem>>>,
}

impl std::fmt::Debug for FileSystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemRegistry")
            .field("entries", &"<locked>")
            .finish()
    }
}

impl Default for FileSystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the open filesystem for `module`, building it with `create` on
    /// a miss or when the registered one has closed.
    pub fn get_or_create<F>(&self, module: &str, create: F) -> ModuleFsResult<Arc<ModuleFileSystem>>
    where
        F: FnOnce() -> ModuleFsResult<Arc<ModuleFileSystem>>,
    {
        let mut entries = self.entries.lock();

        if let Some(fs) = entries.get(module).filter(|fs| fs.is_open()) {
            debug!(module, "registry hit");
            return Ok(Arc::clone(fs));
        }
        let stale = entries.remove(module);
        if stale.is_some() {
            warn!(module, "evicting closed file system");
        }

        debug!(module, "registry miss, constructing");
        let result = create().map(|fs| {
            entries.insert(module.to_string(), Arc::clone(&fs));
            fs
        });
        drop(entries);
        drop(stale);
        result
    }

    /// Return the open filesystem for `module`.
    ///
    /// Fails with [`ModuleFsError::FileSystemNotFound`] when absent or
    /// closed; a closed entry is evicted.
    pub fn get_existing(&self, module: &str) -> ModuleFsResult<Arc<ModuleFileSystem>> {
        let mut entries = self.entries.lock();

        if let Some(fs) = entries.get(module).filter(|fs| fs.is_open()) {
            return Ok(Arc::clone(fs));
        }
        let Some(stale) = entries.remove(module) else {
            return Err(ModuleFsError::FileSystemNotFound(module.to_string()));
        };
        drop(entries);
        warn!(module, "evicted closed file system");
        drop(stale);
        Err(ModuleFsError::FileSystemNotFound(module.to_string()))
    }

    /// Register `fs` under its module name, replacing any previous entry.
    pub fn insert(&self, fs: Arc<ModuleFileSystem>) {
        let replaced = self.entries.lock().insert(fs.module().to_string(), fs);
        if let Some(previous) = &replaced {
            debug!(module = previous.module(), "replaced registered file system");
        }
    }

    /// Remove the entry for `module` only if it is `fs`.
    ///
    /// A filesystem closing after it was replaced leaves its successor in
    /// place.
    pub fn remove_if_same(&self, module: &str, fs: &ModuleFileSystem) -> bool {
        let mut entries = self.entries.lock();
        let same = entries
            .get(module)
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), fs));
        let removed = if same { entries.remove(module) } else { None };
        drop(entries);
        removed.is_some()
    }

    /// Returns true if `module` has an entry, open or not.
    pub fn contains(&self, module: &str) -> bool {
        self.entries.lock().contains_key(module)
    }

    /// Registered module names, sorted.
    pub fn modules(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
