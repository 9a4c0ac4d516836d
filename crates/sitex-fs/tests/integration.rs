use std::path::Path;

use sitex_fs::{DiskFs, Filesystem, MemoryFs};
use tempfile::tempdir;

fn guard_file_round_trip(fs: &dyn Filesystem, dir: &Path) {
    let index = dir.join("index.php");
    assert!(!fs.exists(&index));

    fs.create_dir_all(dir).unwrap();
    fs.write(&index, b"<?php // Silence is golden.").unwrap();

    assert!(fs.is_file(&index));
    assert!(fs.is_readable(&index));
    assert_eq!(fs.size(&index).unwrap(), 27);
    assert!(fs.delete(&index).unwrap());
    assert!(!fs.delete(&index).unwrap());
}

#[test]
fn test_disk_and_memory_agree() {
    let dir = tempdir().unwrap();
    guard_file_round_trip(&DiskFs, &dir.path().join("exports"));
    guard_file_round_trip(&MemoryFs::new(), Path::new("/srv/uploads/exports"));
}

#[test]
fn test_canonicalize_missing_path_fails() {
    let dir = tempdir().unwrap();
    assert!(DiskFs.canonicalize(&dir.path().join("nope")).is_err());
    assert!(MemoryFs::new().canonicalize(Path::new("/nope")).is_err());
}
