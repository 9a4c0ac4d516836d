use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sitex_fs::{DiskFs, Filesystem};
use sitex_guard::dump_file_name;
use tracing::{info, warn};

use crate::command::{Command, combined_output};
use crate::error::{Error, Result};
use crate::locate::{Locate, SystemPath, ToolSpec, WP_CLI, discover};

/// A database dump written into the export directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseDumpFile {
    pub file_name: String,
    pub path: PathBuf,
}

/// Something that can write a database dump into a directory.
pub trait DumpDatabase: Send + Sync {
    fn dump(&self, target_dir: &Path, created_at: DateTime<Utc>) -> Result<DatabaseDumpFile>;
}

/// Runs `wp db export` for one site.
///
/// The tool writes the dump itself. Checking and removing what it left
/// behind goes through the configured [`Filesystem`].
pub struct DatabaseDumpRunner {
    locator: Box<dyn Locate>,
    fs: Arc<dyn Filesystem>,
    tool: ToolSpec,
    site_root: PathBuf,
    site_name: String,
    exec_enabled: bool,
}

impl DatabaseDumpRunner {
    pub fn new(site_root: impl Into<PathBuf>, site_name: impl Into<String>) -> Self {
        Self {
            locator: Box::new(SystemPath),
            fs: Arc::new(DiskFs::new()),
            tool: WP_CLI,
            site_root: site_root.into(),
            site_name: site_name.into(),
            exec_enabled: true,
        }
    }

    pub fn locator(mut self, locator: impl Locate + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn exec_enabled(mut self, enabled: bool) -> Self {
        self.exec_enabled = enabled;
        self
    }
}

impl DumpDatabase for DatabaseDumpRunner {
    /// Dump the database into `target_dir`.
    ///
    /// The run counts as successful only if the dump file exists and is
    /// non-empty afterwards, whatever the tool's exit status.
    fn dump(&self, target_dir: &Path, created_at: DateTime<Utc>) -> Result<DatabaseDumpFile> {
        if !self.exec_enabled {
            return Err(Error::ExecDisabled);
        }
        let binary = discover(self.locator.as_ref(), self.tool)?;

        let file_name = dump_file_name(&self.site_name, created_at);
        let path = target_dir.join(&file_name);

        let output = Command::new(&binary)
            .args(["db", "export"])
            .arg(&path)
            .arg(format!("--path={}", self.site_root.display()))
            .arg("--allow-root")
            .output()?;
        let text = combined_output(&output);

        let written = self.fs.size(&path).unwrap_or(0);
        if written == 0 {
            remove_empty(self.fs.as_ref(), &path);
            let message = match text.trim() {
                "" => "WP-CLI command failed silently.".to_string(),
                trimmed => trimmed.to_string(),
            };
            return Err(Error::DumpFailed(message));
        }

        if !output.status.success() {
            warn!(status = %output.status, "database export exited unsuccessfully but produced a dump");
        }
        info!(file = %file_name, bytes = written, "database export successful");
        Ok(DatabaseDumpFile { file_name, path })
    }
}

fn remove_empty(fs: &dyn Filesystem, path: &Path) {
    match fs.delete(path) {
        Ok(true) => info!(path = %path.display(), "removed empty dump file"),
        Ok(false) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove empty dump file"),
    }
}

impl std::fmt::Debug for DatabaseDumpRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseDumpRunner")
            .field("tool", &self.tool.name)
            .field("site_root", &self.site_root)
            .field("exec_enabled", &self.exec_enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_disabled_fails_fast() {
        let runner = DatabaseDumpRunner::new("/var/www", "site").exec_enabled(false);
        let result = runner.dump(Path::new("/tmp"), Utc::now());
        assert!(matches!(result, Err(Error::ExecDisabled)));
    }
}
