// tests/watchable_hierarchies.rs

mod common;
use crate::common::builders::{dir_snapshot, file_snapshot};
use crate::common::fake_watcher::FakeFileSystemDetector;
use crate::common::init_tracing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vfswatch::errors::VfsError;
use vfswatch::fs::mock::MockFileSystem;
use vfswatch::snapshot::{NoopDiffListener, SnapshotHierarchy};
use vfswatch::watch::{ProbeRegistry, WatchableHierarchies};

fn hierarchies(immutable: Vec<PathBuf>) -> (WatchableHierarchies, Arc<ProbeRegistry>) {
    let probes = Arc::new(ProbeRegistry::new(
        Arc::new(MockFileSystem::new()),
        Arc::new(FakeFileSystemDetector::new()),
        ".vfswatch",
    ));
    (WatchableHierarchies::new(Arc::clone(&probes), immutable), probes)
}

fn with_content(root: SnapshotHierarchy, dir: &str) -> SnapshotHierarchy {
    let file = format!("{dir}/f.txt");
    root.store(
        Path::new(dir),
        dir_snapshot(dir, vec![file_snapshot(&file, "f")]),
        &mut NoopDiffListener,
    )
}

fn registered(hierarchies: &WatchableHierarchies) -> Vec<PathBuf> {
    hierarchies.hierarchies().cloned().collect()
}

#[test]
fn immutable_locations_cannot_be_registered() {
    init_tracing();

    let (mut hierarchies, _) = hierarchies(vec![PathBuf::from("/opt/jdk")]);
    let err = hierarchies
        .register_watchable_hierarchy(Path::new("/opt/jdk/lib"), &SnapshotHierarchy::empty())
        .unwrap_err();

    assert!(matches!(err, VfsError::UnwatchableHierarchy(_)));
    assert!(hierarchies.is_empty());
}

#[test]
fn snapshots_retained_without_watching_block_registration() {
    init_tracing();

    let (mut hierarchies, _) = hierarchies(vec![PathBuf::from("/opt/jdk")]);
    let root = with_content(SnapshotHierarchy::empty(), "/proj/src");

    match hierarchies.register_watchable_hierarchy(Path::new("/proj"), &root) {
        Err(VfsError::StaleSnapshot { snapshot, hierarchy }) => {
            assert_eq!(snapshot, PathBuf::from("/proj/src"));
            assert_eq!(hierarchy, PathBuf::from("/proj"));
        }
        other => panic!("expected StaleSnapshot, got {other:?}"),
    }

    // Content below an immutable location never goes stale.
    let immutable = with_content(SnapshotHierarchy::empty(), "/opt/jdk/lib");
    hierarchies
        .register_watchable_hierarchy(Path::new("/opt"), &immutable)
        .unwrap();
}

#[test]
fn registering_inside_a_registered_hierarchy_is_fine() {
    init_tracing();

    let (mut hierarchies, _) = hierarchies(Vec::new());
    let empty = SnapshotHierarchy::empty();
    hierarchies.register_watchable_hierarchy(Path::new("/proj"), &empty).unwrap();

    let root = with_content(empty, "/proj/sub");
    hierarchies.register_watchable_hierarchy(Path::new("/proj/sub"), &root).unwrap();

    assert_eq!(registered(&hierarchies), vec![PathBuf::from("/proj/sub"), PathBuf::from("/proj")]);
    assert_eq!(hierarchies.watched_hierarchies(&root).len(), 2);
}

#[test]
fn prune_drops_empty_then_least_recently_used() {
    init_tracing();

    let (mut hierarchies, probes) = hierarchies(Vec::new());
    let empty = SnapshotHierarchy::empty();
    for h in ["/a", "/b", "/c", "/d"] {
        hierarchies.register_watchable_hierarchy(Path::new(h), &empty).unwrap();
    }
    // `/a` is used again, so `/b` is now the oldest.
    hierarchies.register_watchable_hierarchy(Path::new("/a"), &empty).unwrap();

    let mut root = SnapshotHierarchy::empty();
    for dir in ["/a", "/b", "/c"] {
        root = with_content(root, dir);
    }

    let evicted = hierarchies.prune(&root, 2);

    assert_eq!(evicted, vec![PathBuf::from("/b")]);
    assert_eq!(registered(&hierarchies), vec![PathBuf::from("/a"), PathBuf::from("/c")]);
    assert!(probes.state_of(Path::new("/b")).is_none());
    assert!(probes.state_of(Path::new("/d")).is_none());
    assert!(probes.state_of(Path::new("/a")).is_some());
}

#[test]
fn unsupported_file_systems_stay_registered_but_unwatched() {
    init_tracing();

    let (mut hierarchies, _) = hierarchies(Vec::new());
    hierarchies.update_unsupported_file_systems(vec![PathBuf::from("/mnt/nfs")]);
    hierarchies
        .register_watchable_hierarchy(Path::new("/mnt/nfs/proj"), &SnapshotHierarchy::empty())
        .unwrap();

    let root = with_content(SnapshotHierarchy::empty(), "/mnt/nfs/proj");
    assert!(!hierarchies.is_watchable(Path::new("/mnt/nfs/proj/f.txt")));
    assert!(hierarchies.watched_hierarchies(&root).is_empty());
    assert_eq!(
        hierarchies.unsupported_snapshot_roots(&root),
        vec![PathBuf::from("/mnt/nfs/proj")]
    );

    assert!(hierarchies.prune(&SnapshotHierarchy::empty(), 10).is_empty());
    assert_eq!(hierarchies.len(), 1);
}

#[test]
fn unwatched_roots_exclude_immutable_and_watched_content() {
    init_tracing();

    let (mut hierarchies, _) = hierarchies(vec![PathBuf::from("/opt/jdk")]);
    hierarchies
        .register_watchable_hierarchy(Path::new("/proj"), &SnapshotHierarchy::empty())
        .unwrap();

    let mut root = SnapshotHierarchy::empty();
    for dir in ["/proj/src", "/tmp/scratch", "/opt/jdk/lib"] {
        root = with_content(root, dir);
    }

    assert_eq!(hierarchies.unwatched_snapshot_roots(&root), vec![PathBuf::from("/tmp/scratch")]);
}

#[test]
fn unproven_hierarchies_are_unregistered() {
    init_tracing();

    let (mut hierarchies, probes) = hierarchies(Vec::new());
    hierarchies
        .register_watchable_hierarchy(Path::new("/proj"), &SnapshotHierarchy::empty())
        .unwrap();
    probes.arm(Path::new("/proj"));

    assert_eq!(hierarchies.remove_unproven_hierarchies(), vec![PathBuf::from("/proj")]);
    assert!(hierarchies.is_empty());
    assert!(probes.state_of(Path::new("/proj")).is_none());
}
