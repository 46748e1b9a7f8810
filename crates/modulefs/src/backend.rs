//! Backend selection.
//!
//! Each constructor inspects a physical location and either declines it or
//! builds a filesystem. They are tried in a fixed order (image, archive,
//! directory) and the first one to claim the location wins.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::archives::SharedArchiveHandles;
use crate::config::ModuleFsConfig;
use crate::error::{ModuleFsError, ModuleFsResult};
use crate::filesystem::{BackendKind, Backing, ModuleFileSystem};
use crate::image::ImageStore;
use crate::registry::FileSystemRegistry;
use crate::uri::Uri;
use crate::vfs::{LocalBackend, VfsError};

/// Everything a constructor needs to build a filesystem.
pub(crate) struct ConstructContext<'a> {
    pub module: &'a str,
    pub location: &'a Uri,
    pub config: &'a ModuleFsConfig,
    pub image: &'a ImageStore,
    pub archives: &'a Arc<SharedArchiveHandles>,
    pub registry: Weak<FileSystemRegistry>,
}

type Constructor = fn(&ConstructContext<'_>) -> ModuleFsResult<Option<Arc<ModuleFileSystem>>>;

/// Constructors in priority order.
const CONSTRUCTORS: [(BackendKind, Constructor); 3] = [
    (BackendKind::Image, construct_image),
    (BackendKind::Archive, construct_archive),
    (BackendKind::Directory, construct_directory),
];

/// Build a filesystem with the first constructor that claims the location.
pub(crate) fn construct(ctx: &ConstructContext<'_>) -> ModuleFsResult<Arc<ModuleFileSystem>> {
    for (kind, constructor) in CONSTRUCTORS {
        if let Some(fs) = constructor(ctx)? {
            debug!(module = ctx.module, location = %ctx.location, %kind, "constructed module file system");
            return Ok(fs);
        }
    }
    Err(ModuleFsError::UnsupportedBackend(ctx.location.scheme().to_string()))
}

fn construct_image(ctx: &ConstructContext<'_>) -> ModuleFsResult<Option<Arc<ModuleFileSystem>>> {
    if ctx.location.scheme() != ctx.config.image_scheme {
        return Ok(None);
    }

    let backend = ctx.image.open()?;
    Ok(Some(ModuleFileSystem::new(
        ctx.module,
        ImageStore::module_base(ctx.module),
        backend,
        Backing::Image,
        ctx.registry.clone(),
    )))
}

fn construct_archive(ctx: &ConstructContext<'_>) -> ModuleFsResult<Option<Arc<ModuleFileSystem>>> {
    if !ctx.config.is_archive_path(ctx.location.path()) {
        return Ok(None);
    }
    if ctx.location.scheme() != ctx.config.directory_scheme {
        return Err(ModuleFsError::UnsupportedBackend(ctx.location.scheme().to_string()));
    }

    // The handle table is keyed by file identity, not by spelling.
    let archive = dunce::canonicalize(local_path(ctx.location)?)?;
    let backend = ctx.archives.acquire(&archive)?;
    Ok(Some(ModuleFileSystem::new(
        ctx.module,
        "/",
        backend,
        Backing::Archive {
            archive,
            handles: Arc::clone(ctx.archives),
        },
        ctx.registry.clone(),
    )))
}

fn construct_directory(ctx: &ConstructContext<'_>) -> ModuleFsResult<Option<Arc<ModuleFileSystem>>> {
    if ctx.location.scheme() != ctx.config.directory_scheme {
        return Ok(None);
    }

    let dir = local_path(ctx.location)?;
    if !dir.is_dir() {
        return Err(VfsError::not_found(dir.display().to_string()).into());
    }
    Ok(Some(ModuleFileSystem::new(
        ctx.module,
        "/",
        Arc::new(LocalBackend::with_native_permissions(dir)),
        Backing::Directory,
        ctx.registry.clone(),
    )))
}

/// Host path of a `file:` location. Locations naming a host are refused.
fn local_path(location: &Uri) -> ModuleFsResult<PathBuf> {
    if location.authority().is_some() {
        return Err(ModuleFsError::invalid_uri(
            location.to_string(),
            "file location has an authority component",
        ));
    }
    let decoded = location.decoded_path()?;
    let path = Path::new(&decoded);
    if !path.is_absolute() {
        return Err(ModuleFsError::invalid_uri(location.to_string(), "location path is not absolute"));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::vfs::MemoryBackend;

    struct Fixture {
        config: ModuleFsConfig,
        image: ImageStore,
        archives: Arc<SharedArchiveHandles>,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("exploded/com/example")).unwrap();
            std::fs::write(dir.path().join("exploded/com/example/a.txt"), "a").unwrap();

            let file = std::fs::File::create(dir.path().join("core.jar")).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("a.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut zip, b"a").unwrap();
            zip.finish().unwrap();

            Self {
                config: ModuleFsConfig::default(),
                image: ImageStore::with_backend(Arc::new(MemoryBackend::read_only_from([(
                    "modules/base/a.txt",
                    "a",
                )]))),
                archives: Arc::new(SharedArchiveHandles::default()),
                dir,
            }
        }

        fn construct(&self, module: &str, location: &str) -> ModuleFsResult<Arc<ModuleFileSystem>> {
            let location = Uri::parse(location)?;
            construct(&ConstructContext {
                module,
                location: &location,
                config: &self.config,
                image: &self.image,
                archives: &self.archives,
                registry: Weak::new(),
            })
        }

        fn file_uri(&self, rel: &str) -> String {
            format!("file://{}", self.dir.path().join(rel).display())
        }
    }

    #[test]
    fn test_image_claims_image_scheme() {
        let fx = Fixture::new();
        let fs = fx.construct("base", "jrt:/base").unwrap();
        assert_eq!(fs.kind(), BackendKind::Image);
        assert_eq!(fs.base_path(), Path::new("/modules/base"));
        assert!(fs.is_read_only());
    }

    #[test]
    fn test_archive_claims_suffix() {
        let fx = Fixture::new();
        let fs = fx.construct("core", &fx.file_uri("core.jar")).unwrap();
        assert_eq!(fs.kind(), BackendKind::Archive);
        assert_eq!(fs.base_path(), Path::new("/"));
        assert!(fs.is_read_only());
        let archive = dunce::canonicalize(fx.dir.path().join("core.jar")).unwrap();
        assert_eq!(fx.archives.ref_count(&archive), 1);

        drop(fs);
        assert_eq!(fx.archives.open_archives(), 0);
    }

    #[test]
    fn test_directory_is_fallback_for_file_scheme() {
        let fx = Fixture::new();
        let fs = fx.construct("exploded", &fx.file_uri("exploded")).unwrap();
        assert_eq!(fs.kind(), BackendKind::Directory);
        assert!(!fs.is_read_only());
    }

    #[test]
    fn test_unclaimed_location() {
        let fx = Fixture::new();
        let err = fx.construct("remote", "http://example.com/mods/remote").unwrap_err();
        assert!(matches!(err, ModuleFsError::UnsupportedBackend(ref s) if s == "http"));
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);

        let err = fx.construct("remote", "http://example.com/mods/remote.jar").unwrap_err();
        assert!(matches!(err, ModuleFsError::UnsupportedBackend(_)));
    }

    #[test]
    fn test_missing_directory() {
        let fx = Fixture::new();
        let err = fx.construct("gone", &fx.file_uri("gone")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[test]
    fn test_archive_spellings_share_one_handle() {
        let fx = Fixture::new();
        let plain = fx.construct("a", &fx.file_uri("core.jar")).unwrap();
        let dotted = fx.construct("b", &fx.file_uri("exploded/../core.jar")).unwrap();
        assert!(Arc::ptr_eq(plain.backend(), dotted.backend()));
        assert_eq!(fx.archives.open_archives(), 1);
        assert_eq!(plain.archive_path(), dotted.archive_path());

        plain.close().unwrap();
        assert!(dotted.is_open());
        dotted.close().unwrap();
        assert_eq!(fx.archives.open_archives(), 0);
    }

    #[test]
    fn test_file_location_with_host_is_refused() {
        let fx = Fixture::new();
        for location in ["file://buildhost/opt/mods/core.jar", "file://buildhost/opt/mods/exploded"] {
            let err = fx.construct("remote", location).unwrap_err();
            assert!(matches!(err, ModuleFsError::InvalidUri { .. }), "{location}");
            assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        }
        assert_eq!(fx.archives.open_archives(), 0);
    }
}
