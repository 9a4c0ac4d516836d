use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

static TRANSIENT_DIRS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^wp-content/(cache|upgrade|temp)/")
        .unwrap_or_else(|e| unreachable!("transient dir pattern is valid: {e}"))
});

static METADATA_FILES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|/)\.(git|svn|hg|DS_Store|htaccess|user\.ini)$")
        .unwrap_or_else(|e| unreachable!("metadata pattern is valid: {e}"))
});

/// Why an entry was left out of the archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExclusionRule {
    /// The entry is the export directory or inside it.
    ExportDir,
    /// Cache, upgrade and temp trees under `wp-content`.
    TransientDir,
    /// Version-control and server metadata.
    Metadata,
}

/// First matching rule for an entry, if any.
///
/// `relative_path` uses `/` separators. Directories are matched with a
/// trailing `/` so that `wp-content/cache` itself is caught by the
/// transient-directory rule.
pub fn classify(full_path: &Path, relative_path: &str, export_dir: &Path) -> Option<ExclusionRule> {
    if full_path.starts_with(export_dir) {
        return Some(ExclusionRule::ExportDir);
    }
    if TRANSIENT_DIRS.is_match(relative_path) {
        return Some(ExclusionRule::TransientDir);
    }
    if METADATA_FILES.is_match(relative_path.trim_end_matches('/')) {
        return Some(ExclusionRule::Metadata);
    }
    None
}

pub fn should_exclude(full_path: &Path, relative_path: &str, export_dir: &Path) -> bool {
    classify(full_path, relative_path, export_dir).is_some()
}

/// Exclusion rules bound to one export directory.
#[derive(Clone, Debug)]
pub struct ExclusionFilter {
    export_dir: std::path::PathBuf,
}

impl ExclusionFilter {
    pub fn new(export_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn check(&self, full_path: &Path, relative_path: &str) -> Option<ExclusionRule> {
        classify(full_path, relative_path, &self.export_dir)
    }

    pub fn excludes(&self, full_path: &Path, relative_path: &str) -> bool {
        self.check(full_path, relative_path).is_some()
    }
}
