use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use sitex_fs::Filesystem;
use sitex_guard::{PathGuard, new_archive_file_name};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::report::EntryFailureKind;
use crate::{BuildOptions, BuildReport, Error, ExclusionFilter, Result};

/// A finished archive on disk.
#[derive(Clone, Debug)]
pub struct ArchiveArtifact {
    pub file_name: String,
    pub path: PathBuf,
    pub report: BuildReport,
}

pub struct ArchiveBuilder<F> {
    guard: PathGuard<F>,
    options: BuildOptions,
}

impl<F: Filesystem> ArchiveBuilder<F> {
    pub fn new(fs: F) -> Self {
        Self {
            guard: PathGuard::new(fs),
            options: BuildOptions::default(),
        }
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Archive `source_root` into a freshly named zip inside `export_dir`,
    /// with `dump` as the first entry.
    ///
    /// The partially written file is removed on every error path.
    ///
    /// Every lookup, read and removal goes through `F`. The tree walk and the
    /// zip target itself need a real directory and a seekable file, so they
    /// stay on disk.
    pub fn build(&self, source_root: &Path, export_dir: &Path, dump: &Path) -> Result<ArchiveArtifact> {
        let file_name = new_archive_file_name(&self.options.site_name, self.options.created_at)?;
        let target = self.guard.validate(export_dir.join(&file_name), export_dir)?;

        let fs = self.guard.filesystem();
        let root = fs.canonicalize(source_root).map_err(|source| Error::SourceRoot {
            path: source_root.to_path_buf(),
            source,
        })?;
        let real_export_dir = fs
            .canonicalize(export_dir)
            .unwrap_or_else(|_| export_dir.to_path_buf());
        let filter = ExclusionFilter::new(real_export_dir);

        let file = File::create_new(&target).map_err(|source| Error::Open {
            path: target.clone(),
            source,
        })?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(self.options.compression.method())
            .unix_permissions(0o644);

        let dump_name = dump
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Err(detail) = add_file(fs, &mut zip, &dump_name, dump, options.clone()) {
            drop(zip);
            discard(fs, &target);
            return Err(Error::Dump {
                path: dump.to_path_buf(),
                detail,
            });
        }

        let mut report = BuildReport::default();
        if let Err(e) = walk(fs, &mut zip, &root, &filter, options, &mut report) {
            drop(zip);
            discard(fs, &target);
            return Err(e);
        }

        if let Err(source) = zip.finish() {
            discard(fs, &target);
            return Err(Error::Finalize {
                path: target,
                source,
            });
        }
        if !fs.exists(&target) {
            return Err(Error::Missing(target));
        }

        info!(
            archive = %target.display(),
            files = report.files_added,
            directories = report.directories_added,
            excluded = report.excluded,
            failures = report.failures.len(),
            "archive built"
        );
        Ok(ArchiveArtifact {
            file_name,
            path: target,
            report,
        })
    }
}

fn walk<F: Filesystem, W: Write + Seek>(
    fs: &F,
    zip: &mut ZipWriter<W>,
    root: &Path,
    filter: &ExclusionFilter,
    options: SimpleFileOptions,
    report: &mut BuildReport,
) -> Result<()> {
    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(next) = walker.next() {
        let entry = match next {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::Traversal {
                    path: root.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                warn!(path = %path.display(), error = %e, "skipping entry that could not be walked");
                report.fail(path, EntryFailureKind::Walk, e);
                continue;
            }
        };
        let path = entry.path();
        let real_dir = entry.file_type().is_dir();

        if !fs.is_readable(path) {
            warn!(path = %path.display(), "skipping unreadable entry");
            report.fail(path, EntryFailureKind::Unreadable, "not readable");
            if real_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        let relative = relative_path(root, path);
        if relative.is_empty() {
            continue;
        }

        let is_dir = real_dir || (entry.path_is_symlink() && fs.is_dir(path));
        let key = if is_dir {
            format!("{relative}/")
        } else {
            relative.clone()
        };

        if let Some(rule) = filter.check(path, &key) {
            debug!(path = %key, ?rule, "excluded");
            report.excluded += 1;
            if real_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        if is_dir {
            match zip.add_directory(key.as_str(), options.clone().unix_permissions(0o755)) {
                Ok(()) => report.directories_added += 1,
                Err(e) => {
                    error!(path = %key, error = %e, "failed to add directory to archive");
                    report.fail(path, EntryFailureKind::AddDirectory, e);
                }
            }
            continue;
        }

        let real = match fs.canonicalize(path) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file without a resolvable real path");
                report.fail(path, EntryFailureKind::Unresolvable, e);
                continue;
            }
        };
        if !fs.is_file(&real) {
            debug!(path = %key, "skipping special file");
            continue;
        }

        match add_file(fs, zip, &relative, &real, options.clone()) {
            Ok(bytes) => {
                report.files_added += 1;
                report.bytes_added += bytes;
            }
            Err(detail) => {
                error!(path = %key, error = %detail, "failed to add file to archive");
                report.fail(path, EntryFailureKind::AddFile, detail);
            }
        }
    }
    Ok(())
}

fn add_file<F: Filesystem, W: Write + Seek>(
    fs: &F,
    zip: &mut ZipWriter<W>,
    name: &str,
    path: &Path,
    options: SimpleFileOptions,
) -> std::result::Result<u64, String> {
    let mut reader = fs.open(path).map_err(|e| e.to_string())?;
    let size = fs.size(path).unwrap_or(0);
    zip.start_file(name, options.large_file(size > u64::from(u32::MAX)))
        .map_err(|e| e.to_string())?;
    match io::copy(&mut reader, zip) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            let _ = zip.abort_file();
            Err(e.to_string())
        }
    }
}

/// Relative path with `/` separators; empty for the root itself.
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn discard<F: Filesystem>(fs: &F, path: &Path) {
    match fs.delete(path) {
        Ok(true) => info!(path = %path.display(), "removed incomplete archive"),
        Ok(false) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove incomplete archive"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let root = Path::new("/srv/site");
        assert_eq!(relative_path(root, Path::new("/srv/site/a/b.txt")), "a/b.txt");
        assert_eq!(relative_path(root, root), "");
        assert_eq!(relative_path(root, Path::new("/elsewhere")), "");
    }
}
