//! Module configuration graphs and module resolution.
//!
//! A graph lists the modules it defines and the parent graphs it sits on.
//! Resolution searches a graph's own modules first, then each parent
//! depth-first, and the first module with a matching name wins.

use serde::{Deserialize, Serialize};

use crate::error::{ModuleFsError, ModuleFsResult};
use crate::uri::Uri;

/// A module known to a configuration graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    /// Module name.
    pub name: String,
    /// Physical location URI, e.g. `file:///opt/mods/core.jar`.
    #[serde(default)]
    pub location: Option<String>,
}

impl ModuleRef {
    /// A module with a known location.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: Some(location.into()),
        }
    }

    /// A module whose location is not known.
    pub fn unlocated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    /// Parse the declared location.
    ///
    /// Fails with [`ModuleFsError::UnresolvedLocation`] if none is declared.
    pub fn location_uri(&self) -> ModuleFsResult<Uri> {
        let location = self
            .location
            .as_deref()
            .ok_or_else(|| ModuleFsError::UnresolvedLocation(self.name.clone()))?;
        Uri::parse(location)
    }
}

/// Read-only view of a module configuration graph.
pub trait ModuleGraph: Send + Sync {
    /// Modules defined directly in this graph.
    fn modules(&self) -> &[ModuleRef];

    /// Parent graphs, in search order.
    fn parents(&self) -> Vec<&dyn ModuleGraph>;
}

/// A plain, serde-loadable module graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleLayer {
    pub modules: Vec<ModuleRef>,
    pub parents: Vec<ModuleLayer>,
}

impl ModuleLayer {
    /// Create an empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module.
    pub fn with_module(mut self, module: ModuleRef) -> Self {
        self.modules.push(module);
        self
    }

    /// Add a parent layer.
    pub fn with_parent(mut self, parent: ModuleLayer) -> Self {
        self.parents.push(parent);
        self
    }
}

impl ModuleGraph for ModuleLayer {
    fn modules(&self) -> &[ModuleRef] {
        &self.modules
    }

    fn parents(&self) -> Vec<&dyn ModuleGraph> {
        self.parents.iter().map(|p| p as &dyn ModuleGraph).collect()
    }
}

fn find_module<'g>(name: &str, graph: &'g dyn ModuleGraph) -> Option<&'g ModuleRef> {
    if let Some(found) = graph.modules().iter().find(|m| m.name == name) {
        return Some(found);
    }
    graph
        .parents()
        .into_iter()
        .find_map(|parent| find_module(name, parent))
}

/// Find the module named `name` in `graph` or its ancestors.
pub fn resolve_module<'g>(name: &str, graph: &'g dyn ModuleGraph) -> ModuleFsResult<&'g ModuleRef> {
    find_module(name, graph).ok_or_else(|| ModuleFsError::ModuleNotFound(name.to_string()))
}

/// Resolve a module name to its physical location.
pub fn resolve_location(name: &str, graph: &dyn ModuleGraph) -> ModuleFsResult<Uri> {
    resolve_module(name, graph)?.location_uri()
}
