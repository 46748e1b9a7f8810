//! The module filesystem provider.
//!
//! Entry points for `module:` addresses: create a filesystem, fetch an open
//! one, or resolve a combined address straight to a path. A provider owns
//! its registry, archive table and image store, so independent providers
//! never share state.

use std::sync::Arc;

use tracing::{debug, info};

use crate::archives::{ArchiveOpener, SharedArchiveHandles, ZipOpener};
use crate::backend::{self, ConstructContext};
use crate::config::{FetchPolicy, ModuleFsConfig};
use crate::error::{ModuleFsError, ModuleFsResult};
use crate::filesystem::ModuleFileSystem;
use crate::image::ImageStore;
use crate::layer::{self, ModuleGraph, ModuleRef};
use crate::path::ModulePath;
use crate::registry::FileSystemRegistry;
use crate::uri::{self, ModuleAddress, Uri};
use crate::vfs::VfsOps;

/// Options for [`ModuleFsProvider::new_file_system`].
#[derive(Default, Clone, Copy)]
pub struct NewFsOptions<'a> {
    /// Module graph to resolve against instead of the boot layer.
    pub layer: Option<&'a dyn ModuleGraph>,
    /// Physical location; skips resolution entirely.
    pub location: Option<&'a str>,
}

impl<'a> NewFsOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: &'a dyn ModuleGraph) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_location(mut self, location: &'a str) -> Self {
        self.location = Some(location);
        self
    }
}

/// Provider of module filesystems.
pub struct ModuleFsProvider {
    config: ModuleFsConfig,
    boot_layer: Arc<dyn ModuleGraph>,
    image: ImageStore,
    archives: Arc<SharedArchiveHandles>,
    registry: Arc<FileSystemRegistry>,
}

impl std::fmt::Debug for ModuleFsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFsProvider")
            .field("config", &self.config)
            .field("image", &self.image)
            .field("archives", &self.archives)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Default for ModuleFsProvider {
    fn default() -> Self {
        Self::new(ModuleFsConfig::default())
    }
}

impl ModuleFsProvider {
    /// Create a provider from configuration alone.
    pub fn new(config: ModuleFsConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ModuleFsProviderBuilder {
        ModuleFsProviderBuilder::default()
    }

    /// Address scheme served by this provider.
    pub fn scheme(&self) -> &'static str {
        uri::MODULE_SCHEME
    }

    pub fn config(&self) -> &ModuleFsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FileSystemRegistry> {
        &self.registry
    }

    pub fn archives(&self) -> &Arc<SharedArchiveHandles> {
        &self.archives
    }

    /// Create a filesystem for `module:/<name>` and register it.
    ///
    /// Always constructs a new filesystem; a filesystem already registered
    /// under the name is replaced in the registry but stays usable by
    /// whoever holds it.
    pub fn new_file_system(
        &self,
        address: &str,
        options: NewFsOptions<'_>,
    ) -> ModuleFsResult<Arc<ModuleFileSystem>> {
        let address = ModuleAddress::parse_filesystem(address)?;
        let fs = self.create(address.module(), options)?;
        self.registry.insert(Arc::clone(&fs));
        info!(module = fs.module(), kind = %fs.kind(), "opened module file system");
        Ok(fs)
    }

    /// Create a filesystem for a module reference, using its declared
    /// location.
    pub fn new_file_system_for(&self, module: &ModuleRef) -> ModuleFsResult<Arc<ModuleFileSystem>> {
        let location = module
            .location
            .as_deref()
            .ok_or_else(|| ModuleFsError::UnresolvedLocation(module.name.clone()))?;
        self.new_file_system(
            &uri::filesystem_address(&module.name),
            NewFsOptions::new().with_location(location),
        )
    }

    /// Fetch the open filesystem for `module:/<name>`.
    ///
    /// Under [`FetchPolicy::Strict`] a miss, or a closed entry, fails with
    /// not-found. Under [`FetchPolicy::CreateOnMiss`] the filesystem is
    /// created and registered instead.
    pub fn get_file_system(&self, address: &str) -> ModuleFsResult<Arc<ModuleFileSystem>> {
        let address = ModuleAddress::parse_filesystem(address)?;
        match self.config.fetch_policy {
            FetchPolicy::Strict => self.registry.get_existing(address.module()),
            FetchPolicy::CreateOnMiss => self.get_or_create(address.module()),
        }
    }

    /// Resolve `module:/<name>/<path>` to a path, opening the module's
    /// filesystem if needed.
    pub fn get_path(&self, address: &str) -> ModuleFsResult<ModulePath> {
        let address = ModuleAddress::parse_path(address)?;
        let fs = self.get_or_create(address.module())?;
        Ok(fs.get_path(address.in_module_path(), &[]))
    }

    fn get_or_create(&self, module: &str) -> ModuleFsResult<Arc<ModuleFileSystem>> {
        self.registry
            .get_or_create(module, || self.create(module, NewFsOptions::new()))
    }

    fn create(&self, module: &str, options: NewFsOptions<'_>) -> ModuleFsResult<Arc<ModuleFileSystem>> {
        let location = match options.location {
            Some(location) => Uri::parse(location)?,
            None => {
                let graph = options.layer.unwrap_or(self.boot_layer.as_ref());
                layer::resolve_location(module, graph)?
            }
        };
        debug!(module, location = %location, "resolved module location");

        backend::construct(&ConstructContext {
            module,
            location: &location,
            config: &self.config,
            image: &self.image,
            archives: &self.archives,
            registry: Arc::downgrade(&self.registry),
        })
    }
}

/// Builder for [`ModuleFsProvider`].
#[derive(Default)]
pub struct ModuleFsProviderBuilder {
    config: ModuleFsConfig,
    boot_layer: Option<Arc<dyn ModuleGraph>>,
    image: Option<Arc<dyn VfsOps>>,
    opener: Option<Arc<dyn ArchiveOpener>>,
}

impl ModuleFsProviderBuilder {
    pub fn config(mut self, config: ModuleFsConfig) -> Self {
        self.config = config;
        self
    }

    /// Module graph used when a request names no layer. Defaults to the
    /// configured boot layer.
    pub fn boot_layer(mut self, layer: impl ModuleGraph + 'static) -> Self {
        self.boot_layer = Some(Arc::new(layer));
        self
    }

    /// Serve the module image from `backend` instead of `image_root`.
    pub fn image_backend(mut self, backend: Arc<dyn VfsOps>) -> Self {
        self.image = Some(backend);
        self
    }

    pub fn archive_opener(mut self, opener: Arc<dyn ArchiveOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn build(self) -> ModuleFsProvider {
        let boot_layer: Arc<dyn ModuleGraph> = match self.boot_layer {
            Some(layer) => layer,
            None => Arc::new(self.config.boot_layer.clone()),
        };
        let image = match self.image {
            Some(backend) => ImageStore::with_backend(backend),
            None => ImageStore::from_root(self.config.image_root.clone()),
        };
        let opener: Arc<dyn ArchiveOpener> = match self.opener {
            Some(opener) => opener,
            None => Arc::new(ZipOpener),
        };

        ModuleFsProvider {
            config: self.config,
            boot_layer,
            image,
            archives: Arc::new(SharedArchiveHandles::new(opener)),
            registry: Arc::new(FileSystemRegistry::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::layer::ModuleLayer;
    use crate::vfs::MemoryBackend;

    fn provider(policy: FetchPolicy) -> ModuleFsProvider {
        let config = ModuleFsConfig {
            fetch_policy: policy,
            ..Default::default()
        };
        ModuleFsProvider::builder()
            .config(config)
            .boot_layer(
                ModuleLayer::new()
                    .with_module(ModuleRef::new("base", "jrt:/base"))
                    .with_module(ModuleRef::unlocated("ghost")),
            )
            .image_backend(Arc::new(MemoryBackend::read_only_from([(
                "modules/base/com/example/a.txt",
                "a",
            )])))
            .build()
    }

    #[test]
    fn test_strict_fetch() {
        let provider = provider(FetchPolicy::Strict);
        let err = provider.get_file_system("module:/base").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let fs = provider.new_file_system("module:/base", NewFsOptions::new()).unwrap();
        assert!(Arc::ptr_eq(&provider.get_file_system("module:/base").unwrap(), &fs));

        fs.close().unwrap();
        assert!(matches!(
            provider.get_file_system("module:/base"),
            Err(ModuleFsError::FileSystemNotFound(_))
        ));
    }

    #[test]
    fn test_create_on_miss_fetch() {
        let provider = provider(FetchPolicy::CreateOnMiss);
        let fs = provider.get_file_system("module:/base").unwrap();
        assert!(Arc::ptr_eq(&provider.get_file_system("module:/base").unwrap(), &fs));
    }

    #[test]
    fn test_resolution_errors() {
        let provider = provider(FetchPolicy::Strict);
        let err = provider.new_file_system("module:/nope", NewFsOptions::new()).unwrap_err();
        assert!(matches!(err, ModuleFsError::ModuleNotFound(_)));

        let err = provider.new_file_system("module:/ghost", NewFsOptions::new()).unwrap_err();
        assert!(matches!(err, ModuleFsError::UnresolvedLocation(_)));

        let err = provider.new_file_system_for(&ModuleRef::unlocated("ghost")).unwrap_err();
        assert!(matches!(err, ModuleFsError::UnresolvedLocation(_)));

        let err = provider.new_file_system("module:/base/", NewFsOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert!(provider.registry().is_empty());
    }

    #[test]
    fn test_explicit_layer_and_location() {
        let provider = provider(FetchPolicy::Strict);
        let layer = ModuleLayer::new().with_module(ModuleRef::new("alias", "jrt:/base"));
        let fs = provider
            .new_file_system("module:/alias", NewFsOptions::new().with_layer(&layer))
            .unwrap();
        assert_eq!(fs.module(), "alias");

        let fs = provider
            .new_file_system("module:/other", NewFsOptions::new().with_location("jrt:/other"))
            .unwrap();
        assert_eq!(fs.base_path(), std::path::Path::new("/modules/other"));
    }

    #[test]
    fn test_get_path_auto_creates() {
        let provider = provider(FetchPolicy::Strict);
        let path = provider.get_path("module:/base/com/example/a.txt").unwrap();
        assert_eq!(path.read().unwrap(), b"a");
        assert!(provider.registry().contains("base"));

        let again = provider.get_path("module:/base/com").unwrap();
        assert!(again.same_file_system(&path));

        let root = provider.get_path("module:/base").unwrap();
        assert_eq!(root, path.file_system().root());
    }

    #[test]
    fn test_providers_are_isolated() {
        let a = provider(FetchPolicy::Strict);
        let b = provider(FetchPolicy::Strict);
        a.new_file_system("module:/base", NewFsOptions::new()).unwrap();
        assert!(b.get_file_system("module:/base").is_err());
    }
}
