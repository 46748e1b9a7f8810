//! Shared fixtures: an exploded module directory, a module archive, and an
//! in-memory module image, all wired into one provider.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use modulefs::{
    ArchiveOpener, MemoryBackend, ModuleFsConfig, ModuleFsProvider, ModuleLayer, ModuleRef,
    VfsOps, VfsResult, ZipOpener,
};

pub const EXPLODED: &str = "com.example.exploded";
pub const ARCHIVED: &str = "com.example.core";
pub const ALIASED: &str = "com.example.alias";
pub const IMAGE: &str = "java.base";

pub const RESOURCE: &str = "com/example/test_resource.txt";
pub const RESOURCE_BYTES: &[u8] = b"Hello from a module resource\n";
pub const IMAGE_RESOURCE: &str = "java/lang/Object.class";
pub const SPACED_RESOURCE: &str = "com/example/my file.txt";

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Archive opener that counts physical opens.
#[derive(Default)]
pub struct CountingOpener {
    opens: AtomicUsize,
}

impl CountingOpener {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ArchiveOpener for CountingOpener {
    fn open(&self, archive: &Path) -> VfsResult<Arc<dyn VfsOps>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        ZipOpener.open(archive)
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub exploded: PathBuf,
    pub archive: PathBuf,
    pub opener: Arc<CountingOpener>,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().expect("tempdir");

        let exploded = dir.path().join("mods").join(EXPLODED);
        fs::create_dir_all(exploded.join("com/example/assets")).unwrap();
        fs::write(exploded.join(RESOURCE), RESOURCE_BYTES).unwrap();
        fs::write(exploded.join("com/example/assets/logo.svg"), "<svg/>").unwrap();
        fs::write(exploded.join(SPACED_RESOURCE), "spaced").unwrap();

        let archive = dir.path().join("mods").join(format!("{ARCHIVED}.jar"));
        write_archive(
            &archive,
            &[
                (RESOURCE, RESOURCE_BYTES),
                ("com/example/Main.class", b"\xCA\xFE\xBA\xBE"),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ],
        );
        // Handle-table keys are canonical paths.
        let archive = fs::canonicalize(&archive).unwrap();

        Self {
            dir,
            exploded,
            archive,
            opener: Arc::new(CountingOpener::default()),
        }
    }

    pub fn layer(&self) -> ModuleLayer {
        let boot = ModuleLayer::new().with_module(ModuleRef::new(IMAGE, format!("jrt:/{IMAGE}")));
        ModuleLayer::new()
            .with_module(ModuleRef::new(EXPLODED, file_uri(&self.exploded)))
            .with_module(ModuleRef::new(ARCHIVED, file_uri(&self.archive)))
            .with_module(ModuleRef::new(ALIASED, file_uri(&self.archive)))
            .with_module(ModuleRef::unlocated("com.example.ghost"))
            .with_parent(boot)
    }

    pub fn provider(&self) -> ModuleFsProvider {
        self.provider_with(ModuleFsConfig::default())
    }

    pub fn provider_with(&self, config: ModuleFsConfig) -> ModuleFsProvider {
        ModuleFsProvider::builder()
            .config(config)
            .boot_layer(self.layer())
            .image_backend(Arc::new(MemoryBackend::read_only_from([(
                format!("modules/{IMAGE}/{IMAGE_RESOURCE}"),
                &b"\xCA\xFE\xBA\xBE"[..],
            )])))
            .archive_opener(self.opener.clone())
            .build()
    }
}

pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

pub fn write_archive(path: &Path, files: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}
