// src/vfs/coalesce.rs

//! Quiet-period coalescing.
//!
//! Handled changes are not surfaced one by one. They pile up until either no
//! new change arrived for the quiet period, or the first pending change has
//! waited for the maximum wait, and then go out as one [`ChangeBatch`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::vfs::listener::{FileChange, FileChangeKind};

/// Pure deadline bookkeeping for one window of pending changes.
#[derive(Debug, Clone)]
pub struct QuietPeriod {
    quiet: Duration,
    max_wait: Duration,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl QuietPeriod {
    pub fn new(quiet: Duration, max_wait: Duration) -> Self {
        Self {
            quiet,
            max_wait,
            first: None,
            last: None,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.first.get_or_insert(now);
        self.last = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.first.is_some()
    }

    /// When the pending window closes, or `None` if nothing is pending.
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first?;
        let last = self.last.unwrap_or(first);
        Some((last + self.quiet).min(first + self.max_wait))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    pub fn reset(&mut self) {
        self.first = None;
        self.last = None;
    }
}

/// Changes that arrived within one window, one per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changes: Vec<FileChange>,
    /// Events were lost or watching stopped; everything may have changed.
    pub overflowed: bool,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.overflowed
    }
}

#[derive(Debug, Default)]
struct PendingChanges {
    order: Vec<PathBuf>,
    latest: HashMap<PathBuf, FileChangeKind>,
    overflowed: bool,
}

impl PendingChanges {
    fn add(&mut self, change: FileChange) {
        if change.is_overflow() {
            self.overflowed = true;
        }
        if change.kind == FileChangeKind::WatchingStopped {
            return;
        }
        if self.latest.insert(change.path.clone(), change.kind).is_none() {
            self.order.push(change.path);
        }
    }

    fn take(&mut self) -> ChangeBatch {
        let mut pending = std::mem::take(self);
        let changes = pending
            .order
            .into_iter()
            .filter_map(|path| {
                let kind = pending.latest.remove(&path)?;
                Some(FileChange { kind, path })
            })
            .collect();
        ChangeBatch {
            changes,
            overflowed: pending.overflowed,
        }
    }
}

/// Coalesce `changes` into batches on `batches` until either side closes.
///
/// Pending changes are flushed once more when the input closes.
pub async fn coalesce_changes(
    mut changes: mpsc::UnboundedReceiver<FileChange>,
    batches: mpsc::Sender<ChangeBatch>,
    quiet: Duration,
    max_wait: Duration,
) {
    let mut window = QuietPeriod::new(quiet, max_wait);
    let mut pending = PendingChanges::default();

    loop {
        let deadline = window.deadline();
        let due = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            received = changes.recv() => match received {
                Some(change) => {
                    window.record(Instant::now());
                    pending.add(change);
                }
                None => {
                    if window.is_pending() {
                        let _ = batches.send(pending.take()).await;
                    }
                    debug!("change stream closed; coalescer exiting");
                    return;
                }
            },
            _ = due => {
                window.reset();
                let batch = pending.take();
                debug!(changes = batch.changes.len(), overflowed = batch.overflowed, "quiet period elapsed");
                if batches.send(batch).await.is_err() {
                    debug!("batch receiver dropped; coalescer exiting");
                    return;
                }
            }
        }
    }
}
