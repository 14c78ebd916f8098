use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use vfswatch::watch::{
    FileSystemDetector, NativeEvent, NativeEventReceiver, NativeWatcher, NativeWatcherFactory, WatchStrategy,
};

/// One call the registry made on a native watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCall {
    Start(Vec<PathBuf>),
    Stop(Vec<PathBuf>),
    Shutdown,
}

/// Shared record of watcher calls, readable from the test.
#[derive(Debug, Clone, Default)]
pub struct WatchLog {
    calls: Arc<Mutex<Vec<WatchCall>>>,
}

impl WatchLog {
    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// How often `path` was started (across all calls).
    pub fn start_count(&self, path: &Path) -> usize {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                WatchCall::Start(paths) => Some(paths.iter().filter(|p| p.as_path() == path).count()),
                _ => None,
            })
            .sum()
    }

    pub fn stop_count(&self, path: &Path) -> usize {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                WatchCall::Stop(paths) => Some(paths.iter().filter(|p| p.as_path() == path).count()),
                _ => None,
            })
            .sum()
    }

    /// Replay all calls since the last shutdown: what is watched right now.
    pub fn watched(&self) -> BTreeSet<PathBuf> {
        let mut watched = BTreeSet::new();
        for call in self.calls() {
            match call {
                WatchCall::Start(paths) => watched.extend(paths),
                WatchCall::Stop(paths) => {
                    for path in paths {
                        watched.remove(&path);
                    }
                }
                WatchCall::Shutdown => watched.clear(),
            }
        }
        watched
    }

    fn push(&self, call: WatchCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// A native watcher that only records what it was asked to do.
#[derive(Debug)]
pub struct FakeNativeWatcher {
    log: WatchLog,
    fail_start: Arc<AtomicBool>,
}

impl NativeWatcher for FakeNativeWatcher {
    fn start_watching(&mut self, directories: &[PathBuf]) -> anyhow::Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("watch limit reached");
        }
        self.log.push(WatchCall::Start(directories.to_vec()));
        Ok(())
    }

    fn stop_watching(&mut self, directories: &[PathBuf]) -> anyhow::Result<bool> {
        self.log.push(WatchCall::Stop(directories.to_vec()));
        Ok(true)
    }

    fn shutdown(&mut self) {
        self.log.push(WatchCall::Shutdown);
    }
}

/// Hands out [`FakeNativeWatcher`]s and keeps the sending side of their
/// event streams so tests can inject native events.
#[derive(Debug, Clone, Default)]
pub struct FakeWatcherFactory {
    log: WatchLog,
    fail_start: Arc<AtomicBool>,
    senders: Arc<Mutex<Vec<mpsc::Sender<NativeEvent>>>>,
    created: Arc<AtomicUsize>,
}

impl FakeWatcherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> WatchLog {
        self.log.clone()
    }

    /// Make every later `start_watching` call fail.
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Number of watchers created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Deliver `event` through the most recently created watcher.
    pub async fn emit(&self, event: NativeEvent) {
        let sender = self.senders.lock().unwrap().last().cloned().expect("no watcher created yet");
        sender.send(event).await.expect("event stream closed");
    }
}

impl NativeWatcherFactory for FakeWatcherFactory {
    fn create(&self, _strategy: WatchStrategy) -> anyhow::Result<(Box<dyn NativeWatcher>, NativeEventReceiver)> {
        let (tx, rx) = mpsc::channel(64);
        self.senders.lock().unwrap().push(tx);
        self.created.fetch_add(1, Ordering::SeqCst);
        let watcher = FakeNativeWatcher {
            log: self.log.clone(),
            fail_start: Arc::clone(&self.fail_start),
        };
        Ok((Box::new(watcher), rx))
    }
}

/// A detector with scripted answers.
#[derive(Debug, Default)]
pub struct FakeFileSystemDetector {
    unsupported: Mutex<Vec<PathBuf>>,
    roots: Mutex<Vec<PathBuf>>,
    fail: AtomicBool,
}

impl FakeFileSystemDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unsupported(&self, mount_points: Vec<PathBuf>) {
        *self.unsupported.lock().unwrap() = mount_points;
    }

    /// Every path below `root` lives on the file system rooted there.
    pub fn add_file_system_root(&self, root: impl Into<PathBuf>) {
        self.roots.lock().unwrap().push(root.into());
    }

    pub fn fail_detection(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl FileSystemDetector for FakeFileSystemDetector {
    fn detect_unsupported_file_systems(&self) -> anyhow::Result<Vec<PathBuf>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mount table not readable");
        }
        Ok(self.unsupported.lock().unwrap().clone())
    }

    fn file_system_root(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .lock()
            .unwrap()
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }
}
