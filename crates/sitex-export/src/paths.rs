use std::path::{Path, PathBuf};

use sitex_fs::Filesystem;
use tracing::{error, info};

use crate::config::ExportConfig;
use crate::{ExportError, Result};

pub const GUARD_FILE: &str = "index.php";
pub const GUARD_CONTENT: &str = "<?php // Silence is golden.";

/// Where archives are written and served from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPaths {
    pub export_dir: PathBuf,
    pub export_url: String,
    pub export_dir_name: String,
}

impl ExportPaths {
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        if config.upload_dir.as_os_str().is_empty() || config.upload_url.trim().is_empty() {
            return Err(ExportError::Configuration(
                "could not determine the upload directory or URL".into(),
            ));
        }
        let name = config.export_dir_name.clone();
        Ok(Self {
            export_dir: config.upload_dir.join(&name),
            export_url: format!("{}/{name}", config.upload_url.trim_end_matches('/')),
            export_dir_name: name,
        })
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.export_dir.join(file_name)
    }

    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.export_url)
    }

    /// Create the export directory and drop a listing guard into it.
    ///
    /// Only a missing directory is fatal; the guard file is best-effort.
    pub fn prepare(&self, fs: &dyn Filesystem) -> Result<()> {
        fs.create_dir_all(&self.export_dir).map_err(|e| {
            ExportError::Configuration(format!("export directory unavailable: {e}"))
        })?;
        write_guard_file(fs, &self.export_dir);
        Ok(())
    }
}

fn write_guard_file(fs: &dyn Filesystem, dir: &Path) {
    let guard = dir.join(GUARD_FILE);
    if fs.exists(&guard) {
        return;
    }
    if !fs.is_writable(dir) {
        error!(dir = %dir.display(), "export directory not writable, listing guard not written");
        return;
    }
    match fs.write(&guard, GUARD_CONTENT.as_bytes()) {
        Ok(()) => info!(path = %guard.display(), "listing guard written"),
        Err(e) => error!(path = %guard.display(), error = %e, "failed to write listing guard"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitex_fs::MemoryFs;

    fn config() -> ExportConfig {
        ExportConfig {
            site_root: "/var/www".into(),
            upload_dir: "/var/www/wp-content/uploads".into(),
            upload_url: "https://example.com/wp-content/uploads/".into(),
            ..ExportConfig::default()
        }
    }

    #[test]
    fn test_paths_from_config() {
        let paths = ExportPaths::from_config(&config()).unwrap();
        assert_eq!(
            paths.export_dir,
            PathBuf::from("/var/www/wp-content/uploads/simple-wp-site-exporter-exports")
        );
        assert_eq!(
            paths.file_url("a.zip"),
            "https://example.com/wp-content/uploads/simple-wp-site-exporter-exports/a.zip"
        );
    }

    #[test]
    fn test_empty_upload_url_rejected() {
        let config = ExportConfig {
            upload_url: String::new(),
            ..config()
        };
        assert!(matches!(
            ExportPaths::from_config(&config),
            Err(ExportError::Configuration(_))
        ));
    }

    #[test]
    fn test_prepare_writes_guard_once() {
        let fs = MemoryFs::new();
        let paths = ExportPaths::from_config(&config()).unwrap();
        paths.prepare(&fs).unwrap();
        let guard = paths.export_dir.join(GUARD_FILE);
        assert_eq!(fs.contents(&guard).unwrap(), GUARD_CONTENT.as_bytes());

        fs.add_file(&guard, "custom");
        paths.prepare(&fs).unwrap();
        assert_eq!(fs.contents(&guard).unwrap(), b"custom");
    }

    #[test]
    fn test_read_only_dir_still_prepares() {
        let fs = MemoryFs::new();
        let paths = ExportPaths::from_config(&config()).unwrap();
        fs.add_dir(&paths.export_dir).set_read_only(&paths.export_dir);
        paths.prepare(&fs).unwrap();
        assert!(!fs.exists(&paths.export_dir.join(GUARD_FILE)));
    }
}
