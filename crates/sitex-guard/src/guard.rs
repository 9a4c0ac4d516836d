use std::path::{Path, PathBuf};

use sitex_fs::Filesystem;
use tracing::warn;

use crate::naming::sanitize_file_name;
use crate::{Error, Result};

/// Extensions accepted by default: archives and database dumps.
pub const ALLOWED_EXTENSIONS: &[&str] = &["zip", "sql"];

/// Validates that a candidate path is safe to read, write, or delete.
///
/// A path passes when it has no traversal sequences, an allowed extension,
/// and resolves to a location inside the base directory. Existing paths must
/// already be canonical, so a symlink planted at the candidate is refused.
/// For paths that do not exist yet, the parent directory is resolved instead
/// and a sanitized file name is attached to it.
#[derive(Debug)]
pub struct PathGuard<F> {
    fs: F,
    extensions: Vec<String>,
}

impl<F: Filesystem> PathGuard<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_ascii_lowercase()).collect();
        self
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Validate `candidate` against `base`, returning the path to use.
    ///
    /// Rejections are logged to the security target with the reason.
    pub fn validate(&self, candidate: impl AsRef<Path>, base: impl AsRef<Path>) -> Result<PathBuf> {
        let candidate = candidate.as_ref();
        let result = self.check(candidate, base.as_ref());
        if let Err(e) = &result {
            warn!(target: "security", path = %candidate.display(), reason = %e, "path rejected");
        }
        result
    }

    pub fn is_valid(&self, candidate: impl AsRef<Path>, base: impl AsRef<Path>) -> bool {
        self.validate(candidate, base).is_ok()
    }

    fn check(&self, candidate: &Path, base: &Path) -> Result<PathBuf> {
        let raw = candidate
            .to_str()
            .ok_or_else(|| Error::NonUtf8(candidate.to_path_buf()))?;

        // Backslashes and NULs never survive normalization safely.
        if raw.contains('\\') || raw.contains('\0') {
            return Err(Error::Traversal(raw.to_string()));
        }

        let normalized = normalize(raw);
        if normalized.contains("..") || normalized.contains("/./") || normalized.ends_with("/.") {
            return Err(Error::Traversal(normalized));
        }
        if !normalized.starts_with('/') {
            return Err(Error::NotAbsolute(normalized));
        }

        let path = PathBuf::from(&normalized);
        if !self.extension_allowed(&path) {
            return Err(Error::Extension(normalized));
        }

        let base_str = base
            .to_str()
            .ok_or_else(|| Error::NonUtf8(base.to_path_buf()))?;
        let normalized_base = normalize(base_str);
        let real_base = self
            .fs
            .canonicalize(Path::new(&normalized_base))
            .map_err(|_| Error::BaseUnresolved(base.to_path_buf()))?;

        if self.fs.exists(&path) {
            let canonical = self
                .fs
                .canonicalize(&path)
                .map_err(|_| Error::ParentUnresolved(path.clone()))?;
            if canonical.as_os_str() != path.as_os_str() {
                return Err(Error::CanonicalMismatch {
                    path: normalized,
                    canonical,
                });
            }
            if !within_base(&canonical, &real_base) {
                return Err(Error::OutsideBase {
                    path: canonical,
                    base: real_base,
                });
            }
            return Ok(canonical);
        }

        self.check_new_file(&path, Path::new(&normalized_base), &real_base)
    }

    fn check_new_file(&self, path: &Path, base: &Path, real_base: &Path) -> Result<PathBuf> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::ParentUnresolved(path.to_path_buf()))?;

        if !within_base(parent, base) {
            return Err(Error::OutsideBase {
                path: parent.to_path_buf(),
                base: base.to_path_buf(),
            });
        }

        let real_parent = self
            .fs
            .canonicalize(parent)
            .map_err(|_| Error::ParentUnresolved(parent.to_path_buf()))?;
        if !within_base(&real_parent, real_base) {
            return Err(Error::OutsideBase {
                path: real_parent,
                base: real_base.to_path_buf(),
            });
        }

        let raw_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidFileName(path.display().to_string()))?;
        let name = sanitize_file_name(raw_name);
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(Error::InvalidFileName(name));
        }

        let resolved = real_parent.join(&name);
        if !self.extension_allowed(&resolved) {
            return Err(Error::Extension(resolved.display().to_string()));
        }
        Ok(resolved)
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|allowed| *allowed == e))
    }
}

/// Collapse runs of `/` into one and drop a trailing separator.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// String-prefix containment with a trailing separator on both sides, so
/// `/srv/exports-evil` is not inside `/srv/exports`.
pub fn within_base(path: &Path, base: &Path) -> bool {
    let path = format!("{}/", path.to_string_lossy().trim_end_matches('/'));
    let base = format!("{}/", base.to_string_lossy().trim_end_matches('/'));
    path.starts_with(&base)
}
