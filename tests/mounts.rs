// tests/mounts.rs

mod common;
use crate::common::init_tracing;

use std::path::PathBuf;

use vfswatch::watch::filesystem::{DefaultFileSystemDetector, FileSystemDetector, parse_unsupported_mounts};

const MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
server:/export/home /home/shared nfs4 rw,relatime,vers=4.2 0 0
//nas/media /mnt/My\\040Media cifs rw,relatime 0 0
host0 /mnt/host 9p rw,trans=virtio 0 0
tmpfs /tmp tmpfs rw,nosuid,nodev 0 0
";

#[test]
fn network_file_systems_are_unsupported() {
    init_tracing();

    let mounts = parse_unsupported_mounts(MOUNTS);

    assert_eq!(
        mounts,
        vec![
            PathBuf::from("/home/shared"),
            PathBuf::from("/mnt/My Media"),
            PathBuf::from("/mnt/host"),
        ]
    );
}

#[test]
fn malformed_lines_are_skipped() {
    init_tracing();

    let mounts = parse_unsupported_mounts("garbage\n\nserver:/x /remote\nserver:/y /data nfs rw 0 0\n");

    assert_eq!(mounts, vec![PathBuf::from("/data")]);
}

#[test]
fn invalid_escapes_are_kept_verbatim() {
    init_tracing();

    let mounts = parse_unsupported_mounts("a /odd\\9xy nfs rw 0 0\nb /tail\\04 nfs rw 0 0\n");

    assert_eq!(mounts, vec![PathBuf::from("/odd\\9xy"), PathBuf::from("/tail\\04")]);
}

#[cfg(target_os = "linux")]
#[test]
fn detector_reads_the_given_mounts_file() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mounts_file = dir.path().join("mounts");
    std::fs::write(&mounts_file, MOUNTS).unwrap();

    let detector = DefaultFileSystemDetector::with_mounts_file(&mounts_file);
    assert_eq!(detector.detect_unsupported_file_systems().unwrap().len(), 3);

    let missing = DefaultFileSystemDetector::with_mounts_file(dir.path().join("nope"));
    assert!(missing.detect_unsupported_file_systems().is_err());
}

#[cfg(unix)]
#[test]
fn file_system_root_of_an_existing_directory() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let root = DefaultFileSystemDetector::default()
        .file_system_root(dir.path())
        .expect("a file system root");

    assert!(dir.path().canonicalize().unwrap().starts_with(&root));
    assert!(
        DefaultFileSystemDetector::default()
            .file_system_root(&dir.path().join("does-not-exist"))
            .is_none()
    );
}
