// tests/snapshot_hierarchy.rs

mod common;
use crate::common::builders::{dir_snapshot, file_snapshot, missing_snapshot};
use crate::common::init_tracing;

use std::path::{Path, PathBuf};

use vfswatch::snapshot::{
    FileSystemLocationSnapshot, FileType, NoopDiffListener, SnapshotCollectingDiffListener, SnapshotHierarchy,
};

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

fn paths(snapshots: &[FileSystemLocationSnapshot]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = snapshots.iter().map(|s| s.path().to_path_buf()).collect();
    paths.sort();
    paths
}

#[test]
fn stored_snapshot_is_found_at_and_below_its_path() {
    init_tracing();

    let root = SnapshotHierarchy::empty().store(Path::new("/proj"), project(), &mut NoopDiffListener);

    assert_eq!(root.find_snapshot(Path::new("/proj")).unwrap().file_type(), FileType::Directory);
    assert_eq!(
        root.find_snapshot(Path::new("/proj/src/A.java")).unwrap().file_type(),
        FileType::RegularFile
    );
    assert_eq!(
        root.find_snapshot(Path::new("/proj/src/Nope.java")).unwrap().file_type(),
        FileType::Missing
    );
    assert!(root.find_snapshot(Path::new("/other")).is_none());
}

#[test]
fn updates_leave_previous_values_untouched() {
    init_tracing();

    let before = SnapshotHierarchy::empty().store(Path::new("/proj"), project(), &mut NoopDiffListener);
    let after = before.invalidate(Path::new("/proj/src/A.java"), &mut NoopDiffListener);

    assert!(before.find_snapshot(Path::new("/proj/src/A.java")).is_some());
    assert!(after.find_snapshot(Path::new("/proj/src/A.java")).is_none());
}

#[test]
fn invalidation_breaks_up_the_complete_ancestor_and_shares_siblings() {
    init_tracing();

    let original = project();
    let root = SnapshotHierarchy::empty().store(Path::new("/proj"), original.clone(), &mut NoopDiffListener);

    let mut diff = SnapshotCollectingDiffListener::default();
    let invalidated = root.invalidate(Path::new("/proj/src/A.java"), &mut diff);

    assert!(invalidated.find_snapshot(Path::new("/proj")).is_none());
    assert!(invalidated.find_snapshot(Path::new("/proj/src")).is_none());

    // Untouched siblings are the very same snapshots.
    let res_before = original.find(Path::new("/proj/res")).unwrap();
    let res_after = invalidated.find_snapshot(Path::new("/proj/res")).unwrap();
    assert!(res_before.ptr_eq(&res_after));
    let gradle_before = original.find(Path::new("/proj/build.gradle")).unwrap();
    let gradle_after = invalidated.find_snapshot(Path::new("/proj/build.gradle")).unwrap();
    assert!(gradle_before.ptr_eq(&gradle_after));

    assert_eq!(paths(&diff.removed), vec![PathBuf::from("/proj")]);
    assert_eq!(
        paths(&diff.added),
        vec![PathBuf::from("/proj/build.gradle"), PathBuf::from("/proj/res")]
    );
}

#[test]
fn invalidating_an_unknown_path_returns_the_same_hierarchy() {
    init_tracing();

    let root = SnapshotHierarchy::empty().store(Path::new("/proj"), project(), &mut NoopDiffListener);
    let mut diff = SnapshotCollectingDiffListener::default();
    let same = root.invalidate(Path::new("/elsewhere/file"), &mut diff);

    assert!(same.ptr_eq(&root));
    assert!(diff.is_empty());
}

#[test]
fn storing_below_a_complete_directory_is_a_no_op() {
    init_tracing();

    let root = SnapshotHierarchy::empty().store(Path::new("/proj"), project(), &mut NoopDiffListener);
    let mut diff = SnapshotCollectingDiffListener::default();
    let same = root.store(
        Path::new("/proj/src/A.java"),
        file_snapshot("/proj/src/A.java", "other"),
        &mut diff,
    );

    assert!(same.ptr_eq(&root));
    assert!(diff.is_empty());
}

#[test]
fn storing_above_existing_snapshots_replaces_them() {
    init_tracing();

    let mut diff = SnapshotCollectingDiffListener::default();
    let root = SnapshotHierarchy::empty()
        .store(Path::new("/proj/src"), dir_snapshot("/proj/src", vec![]), &mut NoopDiffListener)
        .store(Path::new("/proj/lib.jar"), missing_snapshot("/proj/lib.jar"), &mut NoopDiffListener)
        .store(Path::new("/proj"), project(), &mut diff);

    assert_eq!(
        paths(&diff.removed),
        vec![PathBuf::from("/proj/lib.jar"), PathBuf::from("/proj/src")]
    );
    assert_eq!(paths(&diff.added), vec![PathBuf::from("/proj")]);
    assert_eq!(root.root_snapshots().len(), 1);
}

#[test]
fn storing_below_a_file_replaces_the_file() {
    init_tracing();

    let mut diff = SnapshotCollectingDiffListener::default();
    let root = SnapshotHierarchy::empty()
        .store(Path::new("/proj/out"), file_snapshot("/proj/out", "file"), &mut NoopDiffListener)
        .store(Path::new("/proj/out/x"), file_snapshot("/proj/out/x", "x"), &mut diff);

    assert_eq!(paths(&diff.removed), vec![PathBuf::from("/proj/out")]);
    assert!(root.find_snapshot(Path::new("/proj/out/x")).is_some());
    assert!(root.find_snapshot(Path::new("/proj/out")).is_none());
}

#[test]
fn descendants_and_statistics_reflect_contents() {
    init_tracing();

    let root = SnapshotHierarchy::empty()
        .store(Path::new("/proj"), project(), &mut NoopDiffListener)
        .store(Path::new("/tmp/gone"), missing_snapshot("/tmp/gone"), &mut NoopDiffListener);

    assert!(root.has_descendants_under(Path::new("/proj")));
    assert!(root.has_descendants_under(Path::new("/proj/src")));
    assert!(root.has_descendants_under(Path::new("/tmp")));
    assert!(!root.has_descendants_under(Path::new("/var")));

    let stats = root.statistics();
    assert_eq!(stats.files, 3);
    assert_eq!(stats.directories, 3);
    assert_eq!(stats.missing, 1);

    let cleared = {
        let mut diff = SnapshotCollectingDiffListener::default();
        let cleared = root.clear(&mut diff);
        assert_eq!(diff.removed.len(), 2);
        cleared
    };
    assert!(cleared.is_empty());
}
