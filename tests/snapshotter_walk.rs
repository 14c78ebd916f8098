// tests/snapshotter_walk.rs

mod common;
use crate::common::init_tracing;

use std::path::Path;
use std::sync::Arc;

use vfswatch::errors::VfsError;
use vfswatch::fs::mock::MockFileSystem;
use vfswatch::fs::{FileSystem, RealFileSystem};
use vfswatch::hash::ContentFileHasher;
use vfswatch::snapshot::{
    AccessType, DefaultExcludes, DirectorySnapshotter, FileSystemLocationSnapshot, FileType, SnapshottingFilter,
};

fn snapshotter_over(fs: Arc<dyn FileSystem>, excludes: DefaultExcludes) -> DirectorySnapshotter {
    DirectorySnapshotter::new(Arc::clone(&fs), Arc::new(ContentFileHasher::new(fs)), excludes)
}

fn mock_snapshotter(fs: &MockFileSystem) -> DirectorySnapshotter {
    snapshotter_over(Arc::new(fs.clone()), DefaultExcludes::new(["**/.git/**", "*~"]).unwrap())
}

fn paths_of(snapshot: &FileSystemLocationSnapshot) -> Vec<String> {
    let mut paths = Vec::new();
    let mut collect = |s: &FileSystemLocationSnapshot, _: &[String]| {
        paths.push(s.path().to_string_lossy().into_owned());
        vfswatch::snapshot::SnapshotVisitResult::Continue
    };
    snapshot.accept(&mut collect);
    paths
}

#[test]
fn missing_root_is_a_missing_snapshot() {
    init_tracing();

    let fs = MockFileSystem::new();
    let result = mock_snapshotter(&fs)
        .snapshot(Path::new("/nope"), &SnapshottingFilter::all())
        .unwrap();

    assert_eq!(result.snapshot.file_type(), FileType::Missing);
    assert!(!result.filtered);
}

#[test]
fn default_excludes_drop_entries_without_marking_the_walk_filtered() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/src/A.java", "a");
    fs.add_file("/p/src/A.java~", "backup");
    fs.add_file("/p/.git/HEAD", "ref");

    let result = mock_snapshotter(&fs)
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap();

    assert!(!result.filtered);
    assert_eq!(paths_of(&result.snapshot), vec!["/p", "/p/src", "/p/src/A.java"]);
}

#[test]
fn default_excludes_understand_full_glob_syntax() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/keep.txt", "k");
    fs.add_file("/p/a.tmp", "t");
    fs.add_file("/p/docs/b.bak", "b");
    fs.add_file("/p/z.{tmp,bak}", "literal braces are not excluded");
    fs.add_file("/p/x.swp", "s");
    fs.add_file("/p/xy.swp", "longer name, not matched by ?");
    fs.add_file("/p/img/Thumbs.db", "t");
    fs.add_file("/p/web/node_modules/left-pad/index.js", "js");

    let excludes = DefaultExcludes::new([
        "**/*.{tmp,bak}",
        "**/?.swp",
        "**/[Tt]humbs.db",
        "**/node_modules",
    ])
    .unwrap();
    let result = snapshotter_over(Arc::new(fs.clone()), excludes)
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap();

    assert!(!result.filtered);
    assert_eq!(
        paths_of(&result.snapshot),
        vec![
            "/p",
            "/p/docs",
            "/p/img",
            "/p/keep.txt",
            "/p/web",
            "/p/xy.swp",
            "/p/z.{tmp,bak}",
        ]
    );
}

#[test]
fn default_exclude_on_a_directory_tree_drops_the_directory_itself() {
    init_tracing();

    let excludes = DefaultExcludes::new(["**/target/**", "Cargo.lock"]).unwrap();

    assert!(excludes.excludes("target", "target", true));
    assert!(excludes.excludes("target", "crates/core/target", true));
    assert!(!excludes.excludes("target", "target", false));
    assert!(excludes.excludes("Cargo.lock", "crates/core/Cargo.lock", false));
    assert!(!excludes.excludes("Cargo.toml", "Cargo.toml", false));
}

#[test]
fn invalid_default_exclude_is_an_error() {
    init_tracing();

    let err = DefaultExcludes::new(["**/[unclosed"]).unwrap_err();
    assert!(format!("{err:#}").contains("[unclosed"));
}

#[test]
fn filtered_walk_equals_filter_applied_to_full_snapshot() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/src/A.java", "a");
    fs.add_file("/p/src/B.kt", "b");
    fs.add_file("/p/build/out.class", "o");
    fs.add_file("/p/README.md", "r");

    let filter = SnapshottingFilter::new(&["**/*.java".to_string()], &["build".to_string()]).unwrap();
    let snapshotter = mock_snapshotter(&fs);

    let walked = snapshotter.snapshot(Path::new("/p"), &filter).unwrap();
    let full = snapshotter
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap();
    let (applied, removed) = filter.apply(&full.snapshot);

    assert!(walked.filtered);
    assert!(removed);
    assert_eq!(walked.snapshot.content_hash(), applied.content_hash());
    assert_eq!(paths_of(&walked.snapshot), paths_of(&applied));
    assert_eq!(paths_of(&applied), vec!["/p", "/p/src", "/p/src/A.java"]);
}

#[test]
fn applying_a_filter_twice_changes_nothing() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/a.txt", "a");
    fs.add_file("/p/b.log", "b");
    let full = mock_snapshotter(&fs)
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap()
        .snapshot;

    let filter = SnapshottingFilter::new(&["*.txt".to_string()], &[]).unwrap();
    let (once, _) = filter.apply(&full);
    let (twice, removed_again) = filter.apply(&once);

    assert!(!removed_again);
    assert!(once.ptr_eq(&twice));
}

#[test]
fn unreadable_file_fails_the_walk() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/ok.txt", "fine");
    fs.add_unreadable("/p/secret.txt");

    let err = mock_snapshotter(&fs)
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap_err();

    match err {
        VfsError::WalkFailed { path, .. } => assert_eq!(path, Path::new("/p/secret.txt")),
        other => panic!("expected WalkFailed, got {other:?}"),
    }
}

#[test]
fn symlinked_directory_keeps_link_path_and_is_marked() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/shared/lib.txt", "lib");
    fs.add_dir("/p");
    fs.add_symlink("/p/link", "/shared");
    fs.add_symlink("/p/dangling", "/nowhere");

    let snapshot = mock_snapshotter(&fs)
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap()
        .snapshot;

    let link = snapshot.find(Path::new("/p/link")).unwrap();
    assert_eq!(link.file_type(), FileType::Directory);
    assert_eq!(link.access_type(), AccessType::ViaSymlink);
    let lib = snapshot.find(Path::new("/p/link/lib.txt")).unwrap();
    assert_eq!(lib.file_type(), FileType::RegularFile);

    let dangling = snapshot.find(Path::new("/p/dangling")).unwrap();
    assert_eq!(dangling.file_type(), FileType::Missing);
    assert_eq!(dangling.access_type(), AccessType::ViaSymlink);
}

#[test]
fn symlink_back_to_an_ancestor_is_skipped() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/sub/file.txt", "x");
    fs.add_symlink("/p/sub/up", "/p");

    let snapshot = mock_snapshotter(&fs)
        .snapshot(Path::new("/p"), &SnapshottingFilter::all())
        .unwrap()
        .snapshot;

    assert_eq!(paths_of(&snapshot), vec!["/p", "/p/sub", "/p/sub/file.txt"]);
}

#[cfg(unix)]
#[test]
fn real_symlink_loop_terminates() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("a/b")).unwrap();
    std::fs::write(root.join("a/b/file.txt"), "content").unwrap();
    std::os::unix::fs::symlink(root.join("a"), root.join("a/b/loop")).unwrap();

    let snapshotter = snapshotter_over(Arc::new(RealFileSystem), DefaultExcludes::default());
    let result = snapshotter
        .snapshot(&root.join("a"), &SnapshottingFilter::all())
        .unwrap();

    assert!(result.snapshot.find(&root.join("a/b/file.txt")).is_some());
    let b = result.snapshot.find(&root.join("a/b")).unwrap();
    let names: Vec<&str> = b.children().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["file.txt"]);
    // Below a complete directory an absent entry reads as missing.
    assert_eq!(
        result.snapshot.find(&root.join("a/b/loop")).unwrap().file_type(),
        FileType::Missing
    );

    let stats = snapshotter.take_statistics();
    assert_eq!(stats.walks, 1);
    assert_eq!(stats.files, 1);
    assert_eq!(stats.directories, 2);
}

#[test]
fn root_file_is_snapshotted_directly() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/p/only.txt", "only");

    let filter = SnapshottingFilter::new(&["*.java".to_string()], &[]).unwrap();
    let result = mock_snapshotter(&fs).snapshot(Path::new("/p/only.txt"), &filter).unwrap();

    assert_eq!(result.snapshot.file_type(), FileType::RegularFile);
    assert!(!result.filtered);
}
