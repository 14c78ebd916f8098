// tests/watch_policy.rs

mod common;
use crate::common::builders::{dir_snapshot, file_snapshot};
use crate::common::fake_watcher::FakeFileSystemDetector;
use crate::common::init_tracing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use proptest::prelude::*;

use vfswatch::fs::mock::MockFileSystem;
use vfswatch::snapshot::{FileSystemLocationSnapshot, SnapshotCollectingDiffListener, SnapshotHierarchy};
use vfswatch::watch::{
    HierarchicalWatchPolicy, NonHierarchicalWatchPolicy, ProbeRegistry, WatchSetChange, WatchUpdatePolicy,
    WatchableHierarchies,
};

fn hierarchies_for(registered: &[&str]) -> WatchableHierarchies {
    let probes = Arc::new(ProbeRegistry::new(
        Arc::new(MockFileSystem::new()),
        Arc::new(FakeFileSystemDetector::new()),
        ".vfswatch",
    ));
    let mut hierarchies = WatchableHierarchies::new(probes, Vec::new());
    for h in registered {
        hierarchies
            .register_watchable_hierarchy(Path::new(h), &SnapshotHierarchy::empty())
            .unwrap();
    }
    hierarchies
}

fn project() -> FileSystemLocationSnapshot {
    dir_snapshot(
        "/proj",
        vec![
            dir_snapshot("/proj/src", vec![file_snapshot("/proj/src/A.java", "a")]),
            dir_snapshot("/proj/res", vec![file_snapshot("/proj/res/r.txt", "r")]),
            file_snapshot("/proj/build.gradle", "g"),
        ],
    )
}

/// Apply a hierarchy update and feed its diff to `policy`.
fn apply(
    policy: &mut dyn WatchUpdatePolicy,
    hierarchies: &WatchableHierarchies,
    update: impl FnOnce(&mut SnapshotCollectingDiffListener) -> SnapshotHierarchy,
) -> (SnapshotHierarchy, WatchSetChange) {
    let mut diff = SnapshotCollectingDiffListener::default();
    let root = update(&mut diff);
    let change = policy.contents_changed(&diff.removed, &diff.added, &root, hierarchies);
    (root, change)
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[test]
fn non_hierarchical_watches_every_directory_with_content() {
    init_tracing();

    let hierarchies = hierarchies_for(&["/proj"]);
    let mut policy = NonHierarchicalWatchPolicy::new();

    let (root, change) = apply(&mut policy, &hierarchies, |diff| {
        SnapshotHierarchy::empty().store(Path::new("/proj"), project(), diff)
    });

    assert_eq!(change.start, paths(&["/proj", "/proj/res", "/proj/src"]));
    assert!(change.stop.is_empty());
    assert_eq!(policy.watch_count(Path::new("/proj")), 1);
    // The parent of `/proj` is outside every hierarchy.
    assert_eq!(policy.watch_count(Path::new("/")), 0);

    let (_, change) = apply(&mut policy, &hierarchies, |diff| {
        root.invalidate(Path::new("/proj/src/A.java"), diff)
    });

    assert_eq!(change.stop, paths(&["/proj/src"]));
    assert!(change.start.is_empty());
    // Held by `build.gradle` and `res` as separate roots now.
    assert_eq!(policy.watch_count(Path::new("/proj")), 2);
    assert_eq!(policy.watched_directories(), paths(&["/proj", "/proj/res"]));
}

#[test]
fn non_hierarchical_adds_probe_directories() {
    init_tracing();

    let mut policy = NonHierarchicalWatchPolicy::new();

    let change = policy.probe_directories_changed(&paths(&["/proj/.vfswatch"]));
    assert_eq!(change.start, paths(&["/proj/.vfswatch"]));

    let change = policy.probe_directories_changed(&[]);
    assert_eq!(change.stop, paths(&["/proj/.vfswatch"]));
    assert!(policy.watched_directories().is_empty());
}

#[test]
fn hierarchical_watches_only_the_outermost_hierarchy() {
    init_tracing();

    let hierarchies = hierarchies_for(&["/w", "/w/inner", "/other"]);
    let mut policy = HierarchicalWatchPolicy::new();

    let (root, change) = apply(&mut policy, &hierarchies, |diff| {
        SnapshotHierarchy::empty().store(
            Path::new("/w/inner/x"),
            file_snapshot("/w/inner/x", "x"),
            diff,
        )
    });
    assert_eq!(change.start, paths(&["/w"]));
    assert!(policy.is_recursive());

    let (root, change) = apply(&mut policy, &hierarchies, |diff| {
        root.store(Path::new("/other/y"), file_snapshot("/other/y", "y"), diff)
    });
    assert_eq!(change.start, paths(&["/other"]));

    let (_, change) = apply(&mut policy, &hierarchies, |diff| {
        root.invalidate(Path::new("/w"), diff)
    });
    assert_eq!(change.stop, paths(&["/w"]));
    assert_eq!(policy.watched_directories(), paths(&["/other"]));
}

#[derive(Debug, Clone)]
enum Op {
    StoreDir(usize),
    StoreAll,
    Invalidate(usize, Option<usize>),
}

fn dir_path(d: usize) -> String {
    format!("/w/d{d}")
}

fn dir_with_files(d: usize) -> FileSystemLocationSnapshot {
    let dir = dir_path(d);
    dir_snapshot(
        &dir,
        vec![
            file_snapshot(format!("{dir}/f0"), "0"),
            file_snapshot(format!("{dir}/f1"), "1"),
            dir_snapshot(format!("{dir}/sub"), vec![file_snapshot(format!("{dir}/sub/g"), "g")]),
        ],
    )
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize).prop_map(Op::StoreDir),
        Just(Op::StoreAll),
        (0..3usize, proptest::option::of(0..2usize)).prop_map(|(d, f)| Op::Invalidate(d, f)),
    ]
}

proptest! {
    #[test]
    fn incremental_watch_counts_match_a_full_recount(ops in proptest::collection::vec(arb_op(), 1..20)) {
        let hierarchies = hierarchies_for(&["/w"]);
        let mut policy = NonHierarchicalWatchPolicy::new();
        let mut root = SnapshotHierarchy::empty();

        for op in ops {
            let (next, _) = apply(&mut policy, &hierarchies, |diff| match op {
                Op::StoreDir(d) => root.store(Path::new(&dir_path(d)), dir_with_files(d), diff),
                Op::StoreAll => root.store(
                    Path::new("/w"),
                    dir_snapshot("/w", (0..3).map(dir_with_files).collect()),
                    diff,
                ),
                Op::Invalidate(d, file) => {
                    let path = match file {
                        Some(f) => format!("{}/f{f}", dir_path(d)),
                        None => dir_path(d),
                    };
                    root.invalidate(Path::new(&path), diff)
                }
            });
            root = next;
        }

        let mut recount = NonHierarchicalWatchPolicy::new();
        recount.hierarchies_changed(&root, &hierarchies);

        prop_assert_eq!(policy.watched_directories(), recount.watched_directories());
        for directory in recount.watched_directories() {
            prop_assert_eq!(policy.watch_count(&directory), recount.watch_count(&directory));
        }
    }
}
