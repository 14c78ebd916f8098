// src/watch/watcher.rs

//! Native watch seam.
//!
//! The registry only talks to a [`NativeWatcher`]: start and stop watching a
//! batch of directories. Events come back on a bounded channel, so a slow
//! consumer blocks the delivery thread instead of losing events. Shutting the
//! watcher down drops the sending side, and the consumer sees the channel
//! close.

use std::fmt::{self, Debug};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::watch::platform::WatchStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeChangeType {
    Created,
    Modified,
    Removed,
}

impl fmt::Display for NativeChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NativeChangeType::Created => "CREATED",
            NativeChangeType::Modified => "MODIFIED",
            NativeChangeType::Removed => "REMOVED",
        };
        f.write_str(s)
    }
}

/// What the native layer reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    Change {
        change_type: NativeChangeType,
        path: PathBuf,
    },
    /// Events may have been dropped, optionally only below `path`.
    Overflow { path: Option<PathBuf> },
    /// Receiving events failed.
    Failure(String),
}

pub type NativeEventReceiver = mpsc::Receiver<NativeEvent>;

/// The OS watch service, reduced to what the registry needs.
pub trait NativeWatcher: Send + Debug {
    fn start_watching(&mut self, directories: &[PathBuf]) -> Result<()>;

    /// Returns `Ok(false)` if some path could not be unwatched; that is not
    /// an error, the OS may already have dropped the watch.
    fn stop_watching(&mut self, directories: &[PathBuf]) -> Result<bool>;

    /// Release the native handle. No events are delivered afterwards.
    fn shutdown(&mut self);
}

/// Creates a fresh watcher and its event stream whenever watching (re)starts.
pub trait NativeWatcherFactory: Send + Sync + Debug {
    fn create(&self, strategy: WatchStrategy) -> Result<(Box<dyn NativeWatcher>, NativeEventReceiver)>;
}

/// `notify`-backed watcher.
pub struct NotifyNativeWatcher {
    inner: Option<RecommendedWatcher>,
    mode: RecursiveMode,
}

impl Debug for NotifyNativeWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyNativeWatcher")
            .field("mode", &self.mode)
            .field("running", &self.inner.is_some())
            .finish()
    }
}

impl NotifyNativeWatcher {
    /// Start the native watch service.
    ///
    /// The callback runs on notify's own thread and blocks there while the
    /// queue of `capacity` events is full.
    pub fn spawn(strategy: WatchStrategy, capacity: usize) -> Result<(Self, NativeEventReceiver)> {
        let (event_tx, event_rx) = mpsc::channel::<NativeEvent>(capacity.max(1));

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                for event in translate_notify_event(res) {
                    if event_tx.blocking_send(event).is_err() {
                        // Consumer is gone; nothing left to deliver to.
                        break;
                    }
                }
            },
            Config::default(),
        )
        .context("creating native file watcher")?;

        let mode = match strategy {
            WatchStrategy::Hierarchical => RecursiveMode::Recursive,
            WatchStrategy::NonHierarchical => RecursiveMode::NonRecursive,
        };
        info!(?mode, capacity, "native file watcher started");

        Ok((
            Self {
                inner: Some(watcher),
                mode,
            },
            event_rx,
        ))
    }
}

impl NativeWatcher for NotifyNativeWatcher {
    fn start_watching(&mut self, directories: &[PathBuf]) -> Result<()> {
        let watcher = self
            .inner
            .as_mut()
            .ok_or_else(|| anyhow!("native file watcher has been shut down"))?;
        for directory in directories {
            match watcher.watch(directory, self.mode) {
                Ok(()) => debug!(path = %directory.display(), "started watching"),
                // Gone before we got to it; its parent watch reports the removal.
                Err(notify::Error {
                    kind: notify::ErrorKind::PathNotFound,
                    ..
                }) => debug!(path = %directory.display(), "not watching missing directory"),
                Err(err) => {
                    return Err(err).with_context(|| format!("watching {:?}", directory));
                }
            }
        }
        Ok(())
    }

    fn stop_watching(&mut self, directories: &[PathBuf]) -> Result<bool> {
        let watcher = self
            .inner
            .as_mut()
            .ok_or_else(|| anyhow!("native file watcher has been shut down"))?;
        let mut all_stopped = true;
        for directory in directories {
            if let Err(err) = watcher.unwatch(directory) {
                debug!(path = %directory.display(), "could not stop watching: {err}");
                all_stopped = false;
            }
        }
        Ok(all_stopped)
    }

    fn shutdown(&mut self) {
        if self.inner.take().is_some() {
            debug!("native file watcher shut down");
        }
    }
}

/// Creates [`NotifyNativeWatcher`]s with a fixed queue capacity.
#[derive(Debug, Clone)]
pub struct NotifyWatcherFactory {
    pub queue_capacity: usize,
}

impl NativeWatcherFactory for NotifyWatcherFactory {
    fn create(&self, strategy: WatchStrategy) -> Result<(Box<dyn NativeWatcher>, NativeEventReceiver)> {
        let (watcher, events) = NotifyNativeWatcher::spawn(strategy, self.queue_capacity)?;
        Ok((Box::new(watcher), events))
    }
}

/// Map one `notify` callback to the events the registry understands.
///
/// Access events are dropped; a rescan request becomes an overflow.
pub fn translate_notify_event(res: notify::Result<Event>) -> Vec<NativeEvent> {
    let event = match res {
        Ok(event) => event,
        Err(err) => return vec![NativeEvent::Failure(err.to_string())],
    };
    if event.need_rescan() {
        return vec![NativeEvent::Overflow {
            path: event.paths.into_iter().next(),
        }];
    }
    let change_type = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => NativeChangeType::Created,
        EventKind::Remove(_) => NativeChangeType::Removed,
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => NativeChangeType::Modified,
    };
    event
        .paths
        .into_iter()
        .map(|path| NativeEvent::Change { change_type, path })
        .collect()
}
