pub mod builders;
pub mod fake_watcher;

use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};
use vfswatch::fs::FileSystem;
use vfswatch::fs::mock::MockFileSystem;
use vfswatch::hash::{CachingFileHasher, ContentFileHasher};
use vfswatch::snapshot::DefaultExcludes;
use vfswatch::vfs::{WatchingOptions, WatchingVirtualFileSystem};
use vfswatch::watch::{WatchStrategy, WatcherPlatform};

use crate::fake_watcher::{FakeFileSystemDetector, FakeWatcherFactory};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `condition` until it holds, failing the test after 5 seconds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    with_timeout(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// A watching VFS over a mock file system with fake native collaborators.
pub struct MockVfs {
    pub fs: MockFileSystem,
    pub factory: FakeWatcherFactory,
    pub detector: Arc<FakeFileSystemDetector>,
    pub vfs: Arc<WatchingVirtualFileSystem>,
}

impl MockVfs {
    pub fn new(strategy: WatchStrategy) -> Self {
        Self::with_immutable_locations(strategy, Vec::new())
    }

    pub fn with_immutable_locations(strategy: WatchStrategy, immutable_locations: Vec<PathBuf>) -> Self {
        let fs = MockFileSystem::new();
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let factory = FakeWatcherFactory::new();
        let detector = Arc::new(FakeFileSystemDetector::new());
        let hasher = Arc::new(CachingFileHasher::new(Arc::new(ContentFileHasher::new(Arc::clone(&shared)))));
        let options = WatchingOptions {
            strategy,
            platform: WatcherPlatform::Linux,
            probe_dir: ".vfswatch".to_string(),
            immutable_locations,
        };
        let vfs = Arc::new(WatchingVirtualFileSystem::new(
            shared,
            hasher,
            DefaultExcludes::new(["**/.vfswatch/**"]).expect("valid default excludes"),
            detector.clone(),
            Arc::new(factory.clone()),
            options,
        ));
        Self {
            fs,
            factory,
            detector,
            vfs,
        }
    }
}
