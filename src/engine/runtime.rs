// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::fingerprint::CurrentFileCollectionFingerprint;
use crate::vfs::WatchingVirtualFileSystem;

use super::core::{InputTracker, TrackedInput};
use super::{BuildReport, BuildTrigger, InputReport, SessionEvent, SessionOptions};

/// Where finished build reports go.
pub trait ReportSink: Send {
    fn report(&mut self, report: &BuildReport);
}

/// Prints reports to stdout; logs stay on stderr.
#[derive(Debug, Default)]
pub struct StdoutReportSink;

impl ReportSink for StdoutReportSink {
    fn report(&mut self, report: &BuildReport) {
        println!("{report}");
    }
}

/// Forwards reports into a channel (tests, embedding).
#[derive(Debug, Clone)]
pub struct ChannelReportSink {
    tx: mpsc::UnboundedSender<BuildReport>,
}

impl ChannelReportSink {
    pub fn new(tx: mpsc::UnboundedSender<BuildReport>) -> Self {
        Self { tx }
    }
}

impl ReportSink for ChannelReportSink {
    fn report(&mut self, report: &BuildReport) {
        if self.tx.send(report.clone()).is_err() {
            debug!(build = report.build, "report receiver dropped");
        }
    }
}

/// Runs builds against the virtual file system, one initially and one per
/// coalesced change batch.
///
/// This is the IO shell around [`InputTracker`]: it drives the VFS build
/// lifecycle, reads snapshots and hands the fingerprints to the tracker.
pub struct Session<R: ReportSink> {
    vfs: Arc<WatchingVirtualFileSystem>,
    tracker: InputTracker,
    config: ConfigFile,
    event_rx: mpsc::Receiver<SessionEvent>,
    sink: R,
    options: SessionOptions,
    builds: u64,
}

impl<R: ReportSink> fmt::Debug for Session<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tracker", &self.tracker)
            .field("builds", &self.builds)
            .finish_non_exhaustive()
    }
}

impl<R: ReportSink> Session<R> {
    pub fn new(
        vfs: Arc<WatchingVirtualFileSystem>,
        tracker: InputTracker,
        config: ConfigFile,
        event_rx: mpsc::Receiver<SessionEvent>,
        sink: R,
        options: SessionOptions,
    ) -> Self {
        Self {
            vfs,
            tracker,
            config,
            event_rx,
            sink,
            options,
            builds: 0,
        }
    }

    /// Main event loop.
    ///
    /// - Runs the initial build.
    /// - Runs one build per non-empty `ChangesDetected` batch.
    /// - Stops on `ShutdownRequested` or when the event channel closes.
    pub async fn run(mut self) -> Result<()> {
        info!("vfswatch session started");

        self.run_build(BuildTrigger::Initial);

        if !self.options.exit_after_first_build {
            loop {
                let event = match self.event_rx.recv().await {
                    Some(e) => e,
                    None => {
                        info!("session event channel closed; exiting");
                        break;
                    }
                };

                debug!(?event, "session received event");

                match event {
                    SessionEvent::ChangesDetected(batch) => {
                        if batch.is_empty() {
                            continue;
                        }
                        self.run_build(BuildTrigger::from(&batch));
                    }
                    SessionEvent::ShutdownRequested => {
                        info!("shutdown requested; stopping session");
                        break;
                    }
                }
            }
        }

        self.vfs.close();
        info!("session exiting");
        Ok(())
    }

    /// One full pass over all inputs, bracketed by the VFS build lifecycle.
    pub fn run_build(&mut self, trigger: BuildTrigger) -> BuildReport {
        self.builds += 1;
        let settings = &self.config.config;

        let watching = self
            .vfs
            .after_build_started(settings.watch_mode, settings.vfs_logging);
        for hierarchy in self.config.watchable_hierarchies() {
            self.vfs.register_watchable_hierarchy(&hierarchy);
        }

        let mut inputs = Vec::with_capacity(self.tracker.inputs().len());
        let mut fingerprints = Vec::with_capacity(self.tracker.inputs().len());
        for input in self.tracker.inputs() {
            fingerprints.push((input.name.clone(), fingerprint_input(&self.vfs, input)));
        }
        for (name, fingerprint) in fingerprints {
            let report: InputReport = match fingerprint {
                Ok(fingerprint) => self.tracker.record(&name, fingerprint),
                Err(err) => {
                    warn!(input = %name, "could not fingerprint input: {err}");
                    self.tracker.record_failure(&name, err.to_string())
                }
            };
            inputs.push(report);
        }

        let walks = self.vfs.take_walk_statistics();
        debug!(
            walks = walks.walks,
            files = walks.files,
            directories = walks.directories,
            elapsed_ms = walks.elapsed.as_millis() as u64,
            "snapshotting done"
        );

        self.vfs.before_build_finished(
            settings.watch_mode,
            settings.vfs_logging,
            settings.max_hierarchies,
        );
        self.vfs.after_build_finished();

        let report = BuildReport {
            build: self.builds,
            trigger,
            watching,
            inputs,
        };
        info!(
            build = report.build,
            changed = report.changed_inputs().count(),
            "build finished"
        );
        self.sink.report(&report);
        report
    }
}

fn fingerprint_input(
    vfs: &WatchingVirtualFileSystem,
    input: &TrackedInput,
) -> Result<CurrentFileCollectionFingerprint> {
    let roots = input
        .roots
        .iter()
        .map(|root| vfs.read(root, &input.filter))
        .collect::<Result<Vec<_>>>()?;
    Ok(CurrentFileCollectionFingerprint::new(roots, input.strategy.as_ref()))
}
