use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::DateTime;
use sitex_archive::{ArchiveBuilder, BuildOptions, EntryFailureKind, Error};
use sitex_fs::{DiskFs, Filesystem};
use sitex_guard::is_archive_file_name;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    export_dir: PathBuf,
    dump: PathBuf,
}

fn fixture(files: &[&str]) -> Fixture {
    let dir = tempfile::Builder::new()
        .prefix("sitex-archive-")
        .tempdir()
        .expect("Failed to create temp dir");
    let base = dir.path().canonicalize().unwrap();
    let root = base.join("site");
    let export_dir = root.join("wp-content/uploads/simple-wp-site-exporter-exports");
    fs::create_dir_all(&export_dir).unwrap();

    for file in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("contents of {file}")).unwrap();
    }

    let dump = export_dir.join("db_dump_test_2024-01-01_00-00-00.sql");
    fs::write(&dump, "CREATE TABLE wp_posts;").unwrap();

    Fixture {
        _dir: dir,
        root,
        export_dir,
        dump,
    }
}

fn options() -> BuildOptions {
    BuildOptions::default()
        .site_name("test")
        .created_at(DateTime::from_timestamp(1_704_067_200, 0).unwrap())
}

/// Names of the non-directory entries, in archive order.
fn file_entries(path: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .filter_map(|i| {
            let entry = zip.by_index(i).unwrap();
            (!entry.is_dir()).then(|| entry.name().to_string())
        })
        .collect()
}

fn dir_entries(path: &Path) -> BTreeSet<String> {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .filter_map(|i| {
            let entry = zip.by_index(i).unwrap();
            entry.is_dir().then(|| entry.name().to_string())
        })
        .collect()
}

#[test]
fn test_end_to_end_excludes_cache_and_vcs() {
    let fx = fixture(&["a.txt", "wp-content/cache/x.tmp", ".git/HEAD"]);

    let artifact = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    assert!(is_archive_file_name(&artifact.file_name), "{}", artifact.file_name);
    assert!(artifact.path.starts_with(&fx.export_dir));
    assert!(artifact.report.is_complete());

    let files = file_entries(&artifact.path);
    assert_eq!(files, vec!["db_dump_test_2024-01-01_00-00-00.sql", "a.txt"]);
    assert!(!files.iter().any(|f| f.contains("x.tmp") || f.contains("HEAD")));
}

#[test]
fn test_file_count_is_total_minus_excluded_plus_dump() {
    let included = [
        "index.php",
        "wp-config.php",
        "wp-content/themes/twenty/style.css",
        "wp-content/plugins/p/p.php",
        "wp-content/cached.txt",
        "deep/a/b/c/d.txt",
    ];
    let excluded = [
        "wp-content/upgrade/pkg.zip",
        "wp-content/temp/t.tmp",
        "wp-content/cache/page/index.html",
        ".htaccess",
        "deep/.DS_Store",
        "sub/.user.ini",
        ".svn/entries",
    ];
    let all: Vec<&str> = included.iter().chain(excluded.iter()).copied().collect();
    let fx = fixture(&all);

    let artifact = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    let files = file_entries(&artifact.path);
    assert_eq!(files.len(), all.len() - excluded.len() + 1);
    assert_eq!(files[0], "db_dump_test_2024-01-01_00-00-00.sql");
    let names: BTreeSet<_> = files[1..].iter().map(String::as_str).collect();
    assert_eq!(names, included.iter().copied().collect());
    assert_eq!(artifact.report.files_added, included.len());
}

#[test]
fn test_directories_precede_children_and_export_dir_skipped() {
    let fx = fixture(&["wp-content/themes/t/style.css"]);
    fs::create_dir_all(fx.root.join("empty")).unwrap();

    let artifact = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    let dirs = dir_entries(&artifact.path);
    assert!(dirs.contains("empty/"));
    assert!(dirs.contains("wp-content/themes/t/"));
    assert!(dirs.contains("wp-content/uploads/"));
    assert!(!dirs.iter().any(|d| d.contains("simple-wp-site-exporter-exports")));

    let mut zip = zip::ZipArchive::new(File::open(&artifact.path).unwrap()).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    let dir_pos = names.iter().position(|n| n == "wp-content/themes/t/").unwrap();
    let file_pos = names.iter().position(|n| n == "wp-content/themes/t/style.css").unwrap();
    assert!(dir_pos < file_pos);
}

#[test]
fn test_file_contents_round_trip() {
    use std::io::Read;

    let fx = fixture(&["a.txt"]);
    let artifact = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    let mut zip = zip::ZipArchive::new(File::open(&artifact.path).unwrap()).unwrap();
    let mut body = String::new();
    zip.by_name("a.txt").unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "contents of a.txt");
}

#[test]
fn test_missing_dump_aborts_without_leaving_archive() {
    let fx = fixture(&["a.txt"]);
    fs::remove_file(&fx.dump).unwrap();

    let result = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump);

    assert!(matches!(result, Err(Error::Dump { .. })));
    assert_eq!(fs::read_dir(&fx.export_dir).unwrap().count(), 0);
}

#[test]
fn test_missing_source_root_is_fatal() {
    let fx = fixture(&[]);
    let result = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root.join("gone"), &fx.export_dir, &fx.dump);

    assert!(matches!(result, Err(Error::SourceRoot { .. })));
}

#[test]
fn test_missing_export_dir_rejected() {
    let fx = fixture(&["a.txt"]);
    let result = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.root.join("no-such-dir"), &fx.dump);

    assert!(matches!(result, Err(Error::Location(_))));
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_skipped_and_reported() {
    let fx = fixture(&["a.txt"]);
    std::os::unix::fs::symlink(fx.root.join("missing.txt"), fx.root.join("broken.txt")).unwrap();

    let artifact = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    let files = file_entries(&artifact.path);
    assert_eq!(files, vec!["db_dump_test_2024-01-01_00-00-00.sql", "a.txt"]);
    assert_eq!(artifact.report.failures.len(), 1);
    assert_eq!(artifact.report.failures[0].path, fx.root.join("broken.txt"));
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_archived_under_link_name() {
    let fx = fixture(&["real/target.txt"]);
    std::os::unix::fs::symlink(fx.root.join("real/target.txt"), fx.root.join("alias.txt")).unwrap();

    let artifact = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    let files = file_entries(&artifact.path);
    assert!(files.contains(&"alias.txt".to_string()));
    assert!(files.contains(&"real/target.txt".to_string()));
}

#[cfg(unix)]
#[test]
fn test_unreadable_entries_skipped_and_reported() {
    use std::os::unix::fs::PermissionsExt;

    let fx = fixture(&["a.txt", "private.txt", "locked/inner.txt"]);
    let private = fx.root.join("private.txt");
    let locked = fx.root.join("locked");
    fs::set_permissions(&private, fs::Permissions::from_mode(0o000)).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not apply to root.
    if File::open(&private).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = ArchiveBuilder::new(DiskFs::new())
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let artifact = result.unwrap();

    let files = file_entries(&artifact.path);
    assert_eq!(files, vec!["db_dump_test_2024-01-01_00-00-00.sql", "a.txt"]);
    assert!(!dir_entries(&artifact.path).contains("locked/"));

    let unreadable: BTreeSet<_> = artifact
        .report
        .failures
        .iter()
        .filter(|f| f.kind == EntryFailureKind::Unreadable)
        .map(|f| f.path.clone())
        .collect();
    assert_eq!(unreadable, BTreeSet::from([locked, private]));
    assert_eq!(artifact.report.files_added, 1);
}

/// Disk access that reports one path as unreadable.
struct HiddenFile {
    inner: DiskFs,
    hidden: PathBuf,
}

impl Filesystem for HiddenFile {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn is_readable(&self, path: &Path) -> bool {
        path != self.hidden && self.inner.is_readable(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.inner.is_writable(path)
    }

    fn size(&self, path: &Path) -> sitex_fs::Result<u64> {
        self.inner.size(path)
    }

    fn canonicalize(&self, path: &Path) -> sitex_fs::Result<PathBuf> {
        self.inner.canonicalize(path)
    }

    fn create_dir_all(&self, path: &Path) -> sitex_fs::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> sitex_fs::Result<()> {
        self.inner.write(path, content)
    }

    fn open(&self, path: &Path) -> sitex_fs::Result<Box<dyn std::io::Read + Send>> {
        self.inner.open(path)
    }

    fn delete(&self, path: &Path) -> sitex_fs::Result<bool> {
        self.inner.delete(path)
    }
}

#[test]
fn test_readability_comes_from_injected_filesystem() {
    let fx = fixture(&["a.txt", "b.txt"]);
    let fs = HiddenFile {
        inner: DiskFs::new(),
        hidden: fx.root.join("b.txt"),
    };

    let artifact = ArchiveBuilder::new(fs)
        .options(options())
        .build(&fx.root, &fx.export_dir, &fx.dump)
        .unwrap();

    let files = file_entries(&artifact.path);
    assert_eq!(files, vec!["db_dump_test_2024-01-01_00-00-00.sql", "a.txt"]);
    assert_eq!(artifact.report.failures.len(), 1);
    assert_eq!(artifact.report.failures[0].kind, EntryFailureKind::Unreadable);
    assert_eq!(artifact.report.failures[0].path, fx.root.join("b.txt"));
}
