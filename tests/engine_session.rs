// tests/engine_session.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, InputConfigBuilder, dir_snapshot, file_snapshot};
use crate::common::{MockVfs, init_tracing, with_timeout};

use std::path::PathBuf;

use tokio::sync::mpsc;

use vfswatch::config::ConfigFile;
use vfswatch::engine::{
    BuildReport, BuildTrigger, ChannelReportSink, InputStatus, InputTracker, Session, SessionEvent,
    SessionOptions, TrackedInput,
};
use vfswatch::fingerprint::{ChangeKind, CurrentFileCollectionFingerprint, FingerprintingStrategy};
use vfswatch::types::{NormalizerKind, WatchMode};
use vfswatch::vfs::{ChangeBatch, FileChange, FileChangeKind};
use vfswatch::watch::WatchStrategy;

fn project_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_input(
            "sources",
            InputConfigBuilder::new("src").include("**/*.java").build(),
        )
        .with_input("build-script", InputConfigBuilder::new("build.gradle").build())
        .with_watch_mode(WatchMode::Enabled)
        .with_base_dir("/proj")
        .build()
}

fn project_vfs() -> MockVfs {
    let mock = MockVfs::new(WatchStrategy::NonHierarchical);
    mock.fs.add_file("/proj/src/A.java", "class A {}");
    mock.fs.add_file("/proj/src/notes.txt", "not an input");
    mock.fs.add_file("/proj/build.gradle", "apply plugin: 'java'");
    mock
}

struct Harness {
    mock: MockVfs,
    session: Session<ChannelReportSink>,
    events: mpsc::Sender<SessionEvent>,
    reports: mpsc::UnboundedReceiver<BuildReport>,
}

fn harness(options: SessionOptions) -> Harness {
    let mock = project_vfs();
    let cfg = project_config();
    let tracker = InputTracker::from_config(&cfg).unwrap();
    let (events, event_rx) = mpsc::channel(8);
    let (report_tx, reports) = mpsc::unbounded_channel();
    let session = Session::new(
        mock.vfs.clone(),
        tracker,
        cfg,
        event_rx,
        ChannelReportSink::new(report_tx),
        options,
    );
    Harness {
        mock,
        session,
        events,
        reports,
    }
}

fn status_of<'a>(report: &'a BuildReport, input: &str) -> &'a InputStatus {
    &report
        .inputs
        .iter()
        .find(|r| r.input == input)
        .unwrap_or_else(|| panic!("no report for input '{input}'"))
        .status
}

fn fingerprint(root: vfswatch::snapshot::FileSystemLocationSnapshot) -> CurrentFileCollectionFingerprint {
    let cfg = ConfigFileBuilder::new()
        .with_input("in", InputConfigBuilder::new("/p").build())
        .build();
    let input = TrackedInput::from_config("in", &cfg.input["in"], &cfg).unwrap();
    CurrentFileCollectionFingerprint::new(vec![root], input.strategy.as_ref())
}

#[test]
fn tracker_reports_first_build_then_up_to_date_then_changes() {
    init_tracing();

    let mut tracker = InputTracker::default();
    let before = dir_snapshot("/p", vec![file_snapshot("/p/a", "1")]);
    let after = dir_snapshot("/p", vec![file_snapshot("/p/a", "2"), file_snapshot("/p/b", "b")]);

    let report = tracker.record("in", fingerprint(before.clone()));
    assert_eq!(report.status, InputStatus::FirstBuild);
    assert_eq!(report.entries, 2);
    assert!(report.hash.is_some());

    assert_eq!(tracker.record("in", fingerprint(before)).status, InputStatus::UpToDate);

    let report = tracker.record("in", fingerprint(after));
    match &report.status {
        InputStatus::Changed(changes) => {
            let kinds: Vec<(ChangeKind, &str)> =
                changes.iter().map(|c| (c.kind, c.normalized_path.as_str())).collect();
            assert_eq!(kinds, vec![(ChangeKind::Modified, "a"), (ChangeKind::Added, "b")]);
        }
        other => panic!("expected changes, got {other:?}"),
    }
    assert!(report.to_string().starts_with("in: 2 change(s)"));
}

#[test]
fn failure_forgets_the_previous_fingerprint() {
    init_tracing();

    let mut tracker = InputTracker::default();
    let root = dir_snapshot("/p", vec![file_snapshot("/p/a", "1")]);
    tracker.record("in", fingerprint(root.clone()));

    let failed = tracker.record_failure("in", "permission denied".to_string());
    assert_eq!(failed.status, InputStatus::Failed("permission denied".to_string()));
    assert_eq!(failed.hash, None);
    assert_eq!(failed.to_string(), "in: failed: permission denied");

    assert_eq!(tracker.record("in", fingerprint(root)).status, InputStatus::FirstBuild);
}

#[test]
fn tracked_input_follows_its_config() {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .with_input(
            "classpath",
            InputConfigBuilder::new("lib/a.jar")
                .root("lib/b.jar")
                .normalizer(NormalizerKind::NameOnly)
                .ordered(true)
                .build(),
        )
        .with_base_dir("/proj")
        .build();

    let tracker = InputTracker::from_config(&cfg).unwrap();
    let [input] = tracker.inputs() else {
        panic!("expected exactly one input");
    };

    assert_eq!(input.name, "classpath");
    assert_eq!(
        input.roots,
        vec![PathBuf::from("/proj/lib/a.jar"), PathBuf::from("/proj/lib/b.jar")]
    );
    assert_eq!(input.strategy.identifier(), "NAME_ONLY");
}

#[test]
fn batch_trigger_reflects_overflow() {
    init_tracing();

    let batch = ChangeBatch {
        changes: vec![FileChange::new(FileChangeKind::Modified, "/proj/a")],
        overflowed: false,
    };
    assert_eq!(BuildTrigger::from(&batch), BuildTrigger::Changes(1));

    let overflow = ChangeBatch {
        changes: Vec::new(),
        overflowed: true,
    };
    assert_eq!(BuildTrigger::from(&overflow), BuildTrigger::Overflow);
}

#[tokio::test]
async fn builds_fingerprint_inputs_through_the_vfs() {
    init_tracing();

    let mut h = harness(SessionOptions {
        exit_after_first_build: false,
    });

    let first = h.session.run_build(BuildTrigger::Initial);
    assert_eq!(first.build, 1);
    assert!(first.watching);
    assert_eq!(status_of(&first, "sources"), &InputStatus::FirstBuild);
    assert_eq!(status_of(&first, "build-script"), &InputStatus::FirstBuild);
    assert_eq!(h.mock.vfs.watched_hierarchies(), vec![PathBuf::from("/proj")]);
    assert_eq!(with_timeout(h.reports.recv()).await.unwrap(), first);

    // A file that the include filter drops does not change the input.
    h.mock.fs.add_file("/proj/src/notes.txt", "still not an input, but longer");
    h.mock.fs.add_file("/proj/src/A.java", "class A { int x; }");
    h.mock.vfs.invalidate(&[
        PathBuf::from("/proj/src/notes.txt"),
        PathBuf::from("/proj/src/A.java"),
    ]);

    let second = h.session.run_build(BuildTrigger::Changes(2));
    assert_eq!(second.build, 2);
    assert_eq!(status_of(&second, "build-script"), &InputStatus::UpToDate);
    match status_of(&second, "sources") {
        InputStatus::Changed(changes) => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].kind, ChangeKind::Modified);
            assert_eq!(changes[0].path, PathBuf::from("/proj/src/A.java"));
        }
        other => panic!("expected sources to change, got {other:?}"),
    }
    assert_eq!(second.changed_inputs().count(), 1);
}

#[tokio::test]
async fn unreadable_input_is_reported_as_failed() {
    init_tracing();

    let mut h = harness(SessionOptions {
        exit_after_first_build: false,
    });
    h.mock.fs.add_unreadable("/proj/src/B.java");

    let report = h.session.run_build(BuildTrigger::Initial);

    assert!(matches!(status_of(&report, "sources"), InputStatus::Failed(_)));
    assert_eq!(status_of(&report, "build-script"), &InputStatus::FirstBuild);
}

#[tokio::test]
async fn once_runs_a_single_build_and_stops_watching() {
    init_tracing();

    let mut h = harness(SessionOptions {
        exit_after_first_build: true,
    });
    let vfs = h.mock.vfs.clone();

    with_timeout(h.session.run()).await.unwrap();

    let report = h.reports.recv().await.unwrap();
    assert_eq!(report.trigger, BuildTrigger::Initial);
    assert!(h.reports.recv().await.is_none());
    assert!(!vfs.is_watching());
}

#[tokio::test]
async fn change_batches_trigger_builds_until_shutdown() {
    init_tracing();

    let Harness {
        mock,
        session,
        events,
        mut reports,
    } = harness(SessionOptions {
        exit_after_first_build: false,
    });
    let running = tokio::spawn(session.run());

    let first = with_timeout(reports.recv()).await.unwrap();
    assert_eq!(first.trigger, BuildTrigger::Initial);

    // Empty batches are ignored.
    events
        .send(SessionEvent::ChangesDetected(ChangeBatch::default()))
        .await
        .unwrap();

    mock.fs.add_file("/proj/build.gradle", "apply plugin: 'java-library'");
    mock.vfs.invalidate(&[PathBuf::from("/proj/build.gradle")]);
    events
        .send(SessionEvent::ChangesDetected(ChangeBatch {
            changes: vec![FileChange::new(FileChangeKind::Modified, "/proj/build.gradle")],
            overflowed: false,
        }))
        .await
        .unwrap();

    let second = with_timeout(reports.recv()).await.unwrap();
    assert_eq!(second.build, 2);
    assert_eq!(second.trigger, BuildTrigger::Changes(1));
    assert!(matches!(status_of(&second, "build-script"), InputStatus::Changed(_)));
    assert_eq!(status_of(&second, "sources"), &InputStatus::UpToDate);

    events.send(SessionEvent::ShutdownRequested).await.unwrap();
    with_timeout(running).await.unwrap().unwrap();

    assert!(reports.recv().await.is_none());
    assert!(!mock.vfs.is_watching());
}
