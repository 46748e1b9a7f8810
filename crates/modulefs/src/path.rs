//! Module paths.
//!
//! A [`ModulePath`] wraps one backend-native path and the filesystem it
//! belongs to. Structural operations work on the wrapped path and re-wrap
//! the result with the same filesystem. Combining operations only accept
//! paths of the same filesystem instance.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{ModuleFsError, ModuleFsResult};
use crate::filesystem::ModuleFileSystem;
use crate::uri::{self, MODULE_SCHEME};

/// A path inside a module filesystem.
#[derive(Clone)]
pub struct ModulePath {
    fs: Arc<ModuleFileSystem>,
    path: PathBuf,
}

impl ModulePath {
    pub(crate) fn new(fs: Arc<ModuleFileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    fn wrap(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::clone(&self.fs), path)
    }

    /// The owning filesystem.
    pub fn file_system(&self) -> &Arc<ModuleFileSystem> {
        &self.fs
    }

    /// The wrapped backend-native path.
    pub fn backend_path(&self) -> &Path {
        &self.path
    }

    /// Returns true if `other` belongs to the same filesystem instance.
    pub fn same_file_system(&self, other: &ModulePath) -> bool {
        Arc::ptr_eq(&self.fs, &other.fs)
    }

    fn check_same(&self, other: &ModulePath) -> ModuleFsResult<()> {
        if self.same_file_system(other) {
            Ok(())
        } else {
            Err(ModuleFsError::ProviderMismatch)
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.path.has_root()
    }

    /// Root component of an absolute path.
    pub fn root(&self) -> Option<ModulePath> {
        self.is_absolute().then(|| self.wrap("/"))
    }

    /// Last name element.
    pub fn file_name(&self) -> Option<ModulePath> {
        self.path.file_name().map(|name| self.wrap(name))
    }

    pub fn parent(&self) -> Option<ModulePath> {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| self.wrap(parent))
    }

    fn names(&self) -> impl Iterator<Item = Component<'_>> {
        self.path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
    }

    /// Number of name elements; zero for the root.
    pub fn name_count(&self) -> usize {
        self.names().count()
    }

    /// Name element at `index`, counting from the element nearest the root.
    pub fn name(&self, index: usize) -> Option<ModulePath> {
        self.names()
            .nth(index)
            .map(|c| self.wrap(c.as_os_str()))
    }

    /// Relative path of the name elements in `begin..end`.
    pub fn subpath(&self, begin: usize, end: usize) -> Option<ModulePath> {
        if begin >= end || end > self.name_count() {
            return None;
        }
        let sub: PathBuf = self
            .names()
            .skip(begin)
            .take(end - begin)
            .map(|c| c.as_os_str())
            .collect();
        Some(self.wrap(sub))
    }

    /// Iterate over the name elements.
    pub fn iter(&self) -> impl Iterator<Item = ModulePath> + '_ {
        self.names().map(|c| self.wrap(c.as_os_str()))
    }

    /// False for a path of another filesystem.
    pub fn starts_with(&self, other: &ModulePath) -> bool {
        self.same_file_system(other) && self.path.starts_with(&other.path)
    }

    /// Compare against a backend-native path string.
    pub fn starts_with_str(&self, other: &str) -> bool {
        self.path.starts_with(other)
    }

    /// False for a path of another filesystem.
    pub fn ends_with(&self, other: &ModulePath) -> bool {
        self.same_file_system(other) && self.path.ends_with(&other.path)
    }

    pub fn ends_with_str(&self, other: &str) -> bool {
        self.path.ends_with(other)
    }

    /// Remove `.` elements and fold `..` elements, without touching the
    /// backend.
    pub fn normalize(&self) -> ModulePath {
        self.wrap(normalize_lexical(&self.path))
    }

    /// Resolve `other` against this path. An absolute `other` is returned
    /// as is.
    pub fn resolve(&self, other: &ModulePath) -> ModuleFsResult<ModulePath> {
        self.check_same(other)?;
        Ok(self.resolve_path(&other.path))
    }

    pub fn resolve_str(&self, other: &str) -> ModulePath {
        self.resolve_path(Path::new(other))
    }

    fn resolve_path(&self, other: &Path) -> ModulePath {
        if other.has_root() {
            self.wrap(other)
        } else if other.as_os_str().is_empty() {
            self.clone()
        } else {
            self.wrap(self.path.join(other))
        }
    }

    /// Resolve `other` against this path's parent.
    pub fn resolve_sibling(&self, other: &ModulePath) -> ModuleFsResult<ModulePath> {
        self.check_same(other)?;
        Ok(self.resolve_sibling_path(&other.path))
    }

    pub fn resolve_sibling_str(&self, other: &str) -> ModulePath {
        self.resolve_sibling_path(Path::new(other))
    }

    fn resolve_sibling_path(&self, other: &Path) -> ModulePath {
        match self.parent() {
            Some(parent) => parent.resolve_path(other),
            None => self.wrap(other),
        }
    }

    /// Relative path leading from this path to `other`.
    ///
    /// Both paths must be absolute, or both relative.
    pub fn relativize(&self, other: &ModulePath) -> ModuleFsResult<ModulePath> {
        self.check_same(other)?;
        let relative = relativize_lexical(&self.path, &other.path).ok_or_else(|| {
            ModuleFsError::InvalidPath(format!(
                "cannot relativize {} against {}",
                other.path.display(),
                self.path.display()
            ))
        })?;
        Ok(self.wrap(relative))
    }

    /// Absolute form of this path, resolved against the backend root.
    pub fn to_absolute(&self) -> ModulePath {
        if self.is_absolute() {
            self.clone()
        } else {
            self.wrap(Path::new("/").join(&self.path))
        }
    }

    /// Canonical path as reported by the backend. Fails if the path does
    /// not exist.
    pub fn to_real_path(&self) -> ModuleFsResult<ModulePath> {
        let real = self.fs.backend().real_path(&self.path)?;
        Ok(self.wrap(real))
    }

    /// Locator of the form `module:/<name>!/<path relative to module root>`.
    pub fn to_uri(&self) -> String {
        let absolute = normalize_lexical(&self.to_absolute().path);
        let relative = relativize_lexical(self.fs.base_path(), &absolute).unwrap_or(absolute);
        let segments: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(uri::encode_segment(&name.to_string_lossy())),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect();
        format!("{MODULE_SCHEME}:/{}!/{}", self.fs.module(), segments.join("/"))
    }

    /// Order by backend path. Fails for a path of another filesystem.
    pub fn compare_to(&self, other: &ModulePath) -> ModuleFsResult<Ordering> {
        self.check_same(other)?;
        Ok(self.path.cmp(&other.path))
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl fmt::Debug for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulePath")
            .field("module", &self.fs.module())
            .field("path", &self.path)
            .finish()
    }
}

impl PartialEq for ModulePath {
    fn eq(&self, other: &Self) -> bool {
        self.same_file_system(other) && self.path == other.path
    }
}

impl Eq for ModulePath {}

impl Hash for ModulePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.fs).hash(state);
        self.path.hash(state);
    }
}

impl PartialOrd for ModulePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare_to(other).ok()
    }
}

impl<'a> IntoIterator for &'a ModulePath {
    type Item = ModulePath;
    type IntoIter = Box<dyn Iterator<Item = ModulePath> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Fold `.` and `..` lexically. `..` above the root is dropped; leading `..`
/// of a relative path is kept.
pub(crate) fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => out.push(component.as_os_str()),
        }
    }
    out
}

/// Path from `base` to `target`; `None` unless both are absolute or both
/// relative.
pub(crate) fn relativize_lexical(base: &Path, target: &Path) -> Option<PathBuf> {
    if base.has_root() != target.has_root() {
        return None;
    }

    let base: Vec<_> = base.components().filter(|c| *c != Component::CurDir).collect();
    let target: Vec<_> = target.components().filter(|c| *c != Component::CurDir).collect();
    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    Some(out)
}
