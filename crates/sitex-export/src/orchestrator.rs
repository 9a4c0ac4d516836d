//! One export run: dump the database, archive the site, clean up, and
//! schedule the archive's removal.

use std::fmt;
use std::path::{Path, PathBuf};

use sitex_archive::{ArchiveBuilder, BuildOptions, BuildReport, Compression};
use sitex_platform::{DatabaseDumpFile, DatabaseDumpRunner, DumpDatabase};
use tracing::{debug, error, info, warn};

use crate::access::{DELETE_ACTION, DOWNLOAD_ACTION, EXPORT_ACTION, RequestContext, authorize};
use crate::config::{ExportConfig, TimeLimit};
use crate::lifecycle::ArtifactLifecycle;
use crate::paths::ExportPaths;
use crate::services::Services;
use crate::{ExportError, Result};

/// Execution budget a large export is expected to need, in seconds.
pub const TARGET_EXECUTION_TIME: u64 = 1800;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    EnvironmentChecked,
    DirectoriesReady,
    DatabaseDumped,
    Archived,
    Scheduled,
    Done,
    Failed(String),
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::EnvironmentChecked => f.write_str("environment-checked"),
            Self::DirectoriesReady => f.write_str("directories-ready"),
            Self::DatabaseDumped => f.write_str("database-dumped"),
            Self::Archived => f.write_str("archived"),
            Self::Scheduled => f.write_str("scheduled"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// What a finished run hands back for presentation.
#[derive(Clone, Debug)]
pub struct ExportSuccess {
    pub file_name: String,
    pub path: PathBuf,
    /// `path` with the site root replaced by `[wp-root]/`.
    pub display_path: String,
    pub download_token: String,
    pub delete_token: String,
    pub download_url: String,
    pub delete_url: String,
    /// `false` if a deletion job for this path was already pending.
    pub deletion_scheduled: bool,
    pub report: BuildReport,
}

pub struct ExportOrchestrator {
    site_root: PathBuf,
    site_name: String,
    admin_url: String,
    time_limit: TimeLimit,
    compression: Compression,
    paths: ExportPaths,
    services: Services,
    lifecycle: ArtifactLifecycle,
    dumper: Box<dyn DumpDatabase>,
    state: ExportState,
}

impl ExportOrchestrator {
    pub fn new(config: &ExportConfig, paths: ExportPaths, services: Services) -> Self {
        let dumper = DatabaseDumpRunner::new(&config.site_root, &config.site_name)
            .filesystem(services.fs.clone())
            .exec_enabled(config.exec_enabled);
        Self {
            site_root: config.site_root.clone(),
            site_name: config.site_name.clone(),
            admin_url: config.admin_url.clone(),
            time_limit: config.max_execution_time.clone(),
            compression: Compression::default(),
            lifecycle: ArtifactLifecycle::new(config, paths.clone(), services.clone()),
            paths,
            services,
            dumper: Box::new(dumper),
            state: ExportState::Idle,
        }
    }

    pub fn dumper(mut self, dumper: impl DumpDatabase + 'static) -> Self {
        self.dumper = Box::new(dumper);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    /// Run one export for the requester in `ctx`.
    ///
    /// Stops at the first failing step. Once a dump exists it is removed
    /// whether or not archiving succeeds.
    pub fn run(&mut self, ctx: &RequestContext) -> Result<ExportSuccess> {
        let span = ctx.span();
        let _enter = span.enter();
        self.state = ExportState::Idle;

        if let Err(e) = authorize(
            ctx,
            EXPORT_ACTION,
            self.services.tokens.as_ref(),
            self.services.capabilities.as_ref(),
        ) {
            warn!(target: "security", reason = %e, "export request rejected");
            return Err(e);
        }

        match self.steps(ctx) {
            Ok(success) => {
                self.transition(ExportState::Done);
                info!(path = %success.path.display(), "export successful");
                Ok(success)
            }
            Err(e) => {
                self.state = ExportState::Failed(e.public_message());
                error!(error = %e, "export error");
                Err(e)
            }
        }
    }

    fn steps(&mut self, ctx: &RequestContext) -> Result<ExportSuccess> {
        self.check_environment();
        self.transition(ExportState::EnvironmentChecked);

        self.paths.prepare(self.services.fs.as_ref())?;
        self.transition(ExportState::DirectoriesReady);

        let created_at = self.services.clock.now();
        let dump = self.dumper.dump(&self.paths.export_dir, created_at)?;
        self.transition(ExportState::DatabaseDumped);

        let options = BuildOptions::default()
            .site_name(self.site_name.clone())
            .created_at(created_at)
            .compression(self.compression);
        let built = ArchiveBuilder::new(self.services.fs.clone())
            .options(options)
            .build(&self.site_root, &self.paths.export_dir, &dump.path);
        self.clean_up(&dump);
        let artifact = built?;
        if !artifact.report.is_complete() {
            warn!(
                skipped = artifact.report.failures.len(),
                "archive finished with entries left out"
            );
        }
        self.transition(ExportState::Archived);

        let deletion_scheduled = match self.lifecycle.schedule_deletion(&artifact.path) {
            Ok(scheduled) => scheduled,
            Err(e) => {
                error!(
                    path = %artifact.path.display(),
                    error = %e,
                    "could not schedule archive deletion"
                );
                self.discard_archive(&artifact.path);
                return Err(e);
            }
        };
        self.transition(ExportState::Scheduled);

        let tokens = &self.services.tokens;
        let download_token = tokens.issue(DOWNLOAD_ACTION, ctx.user_id)?;
        let delete_token = tokens.issue(DELETE_ACTION, ctx.user_id)?;
        Ok(ExportSuccess {
            display_path: self.display_path(&artifact.path),
            download_url: format!(
                "{}?{DOWNLOAD_ACTION}={}&sse_download_nonce={download_token}",
                self.admin_url, artifact.file_name
            ),
            delete_url: format!(
                "{}?{DELETE_ACTION}={}&sse_delete_nonce={delete_token}",
                self.admin_url, artifact.file_name
            ),
            download_token,
            delete_token,
            deletion_scheduled,
            file_name: artifact.file_name,
            path: artifact.path,
            report: artifact.report,
        })
    }

    fn check_environment(&self) {
        let limit = self.time_limit.seconds();
        if limit > 0 && limit < TARGET_EXECUTION_TIME {
            warn!(
                limit,
                "current execution time limit may be insufficient for large exports"
            );
        } else {
            info!("execution time limit appears adequate for export operations");
        }
    }

    fn clean_up(&self, dump: &DatabaseDumpFile) {
        match self.services.fs.delete(&dump.path) {
            Ok(true) => info!(path = %dump.path.display(), "cleaned up temporary file"),
            Ok(false) => {}
            Err(e) => warn!(path = %dump.path.display(), error = %e, "failed to clean up temporary file"),
        }
    }

    /// An archive nothing will ever delete must not be left behind.
    fn discard_archive(&self, path: &Path) {
        match self.services.fs.delete(path) {
            Ok(_) => info!(path = %path.display(), "removed unscheduled archive"),
            Err(e) => error!(path = %path.display(), error = %e, "failed to remove unscheduled archive"),
        }
    }

    fn display_path(&self, path: &Path) -> String {
        let full = path.to_string_lossy();
        let roots = [
            self.services.fs.canonicalize(&self.site_root).ok(),
            Some(self.site_root.clone()),
        ];
        let relative = roots
            .iter()
            .flatten()
            .find_map(|root| {
                let root = root.to_string_lossy();
                let root = root.trim_end_matches('/');
                full.strip_prefix(root)
                    .filter(|rest| rest.starts_with('/'))
                    .map(|rest| format!("[wp-root]/{rest}"))
            })
            .unwrap_or_else(|| full.to_string());
        collapse_slashes(&relative)
    }

    fn transition(&mut self, next: ExportState) {
        debug!(from = %self.state, to = %next, "export state");
        self.state = next;
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

impl fmt::Debug for ExportOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOrchestrator")
            .field("site_root", &self.site_root)
            .field("paths", &self.paths)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
