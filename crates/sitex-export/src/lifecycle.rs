//! What happens to an archive after it is built: timed deletion,
//! authenticated download, and authenticated deletion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use sitex_fs::Filesystem;
use sitex_guard::{PathGuard, is_archive_file_name};
use sitex_state::{JobQueue, RateLimiter, ScheduledJob};
use tracing::{error, info, warn};

use crate::access::{DELETE_ACTION, DOWNLOAD_ACTION, RequestContext, authorize};
use crate::config::ExportConfig;
use crate::download::DownloadResponse;
use crate::paths::ExportPaths;
use crate::services::Services;
use crate::{ExportError, Result};

/// Job hook for timed archive deletion.
pub const DELETE_HOOK: &str = "delete_export_file";

/// Management page that deletion redirects back to.
pub const MANAGEMENT_PAGE: &str = "tools.php?page=simple-wp-site-exporter";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted(PathBuf),
    /// Nothing to do; the file was already removed.
    AlreadyGone(PathBuf),
}

/// Result of a manual deletion request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteResponse {
    pub outcome: DeletionOutcome,
    pub redirect: String,
}

/// One fired job and what it did.
#[derive(Debug)]
pub struct JobRun {
    pub job: ScheduledJob,
    pub outcome: Result<DeletionOutcome>,
}

pub struct ArtifactLifecycle {
    services: Services,
    guard: PathGuard<Arc<dyn Filesystem>>,
    paths: ExportPaths,
    limiter: RateLimiter,
    jobs: JobQueue,
    admin_url: String,
    deletion_delay: Duration,
}

impl ArtifactLifecycle {
    pub fn new(config: &ExportConfig, paths: ExportPaths, services: Services) -> Self {
        let limiter = RateLimiter::new(
            services.store.clone(),
            services.clock.clone(),
            Duration::seconds(config.rate_limit_secs as i64),
        );
        Self {
            guard: PathGuard::new(services.fs.clone()),
            limiter,
            jobs: JobQueue::new(services.store.clone()),
            admin_url: config.admin_url.clone(),
            deletion_delay: Duration::seconds(config.deletion_delay_secs as i64),
            paths,
            services,
        }
    }

    pub fn paths(&self) -> &ExportPaths {
        &self.paths
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Register the one-shot deletion job for `archive`. Returns `false` if
    /// one is already pending for that exact path.
    pub fn schedule_deletion(&self, archive: &Path) -> Result<bool> {
        let key = archive.to_string_lossy();
        let run_at = self.services.clock.now() + self.deletion_delay;
        let scheduled = self
            .jobs
            .schedule(DELETE_HOOK, &key, run_at, json!({ "path": key }))?;
        if scheduled {
            info!(path = %key, %run_at, "archive deletion scheduled");
        }
        Ok(scheduled)
    }

    /// Fire every job that is due. Jobs are dequeued before they run and are
    /// never retried.
    pub fn run_due(&self) -> Result<Vec<JobRun>> {
        let due = self.jobs.take_due(self.services.clock.now())?;
        let mut runs = Vec::with_capacity(due.len());
        for job in due {
            let outcome = if job.hook != DELETE_HOOK {
                warn!(hook = %job.hook, "no handler for scheduled job");
                Err(ExportError::Validation(format!("unknown job hook '{}'", job.hook)))
            } else {
                match job.payload.get("path").and_then(|p| p.as_str()) {
                    Some(path) => self.handle_scheduled_deletion(Path::new(path)),
                    None => {
                        warn!(key = %job.key, "scheduled deletion without a path");
                        Err(ExportError::Validation("job payload has no path".into()))
                    }
                }
            };
            runs.push(JobRun { job, outcome });
        }
        Ok(runs)
    }

    /// Delete an archive whose timer fired.
    ///
    /// The path from the job goes through the same name and path rules as a
    /// manual deletion and must resolve to itself. A file that is already
    /// gone counts as success.
    pub fn handle_scheduled_deletion(&self, path: &Path) -> Result<DeletionOutcome> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let validated = match self.validate_name(name) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(target: "security", path = %path.display(), reason = %e, "scheduled deletion blocked");
                return Err(e);
            }
        };
        if validated != path {
            let e = ExportError::Validation(format!(
                "job path '{}' does not match '{}'",
                path.display(),
                validated.display()
            ));
            warn!(target: "security", reason = %e, "scheduled deletion blocked");
            return Err(e);
        }

        match self.services.fs.delete(&validated) {
            Ok(true) => {
                info!(path = %validated.display(), "scheduled deletion successful");
                Ok(DeletionOutcome::Deleted(validated))
            }
            Ok(false) => {
                info!(path = %validated.display(), "scheduled deletion found nothing to delete");
                Ok(DeletionOutcome::AlreadyGone(validated))
            }
            Err(e) => {
                error!(path = %validated.display(), error = %e, "scheduled deletion failed");
                Err(e.into())
            }
        }
    }

    /// Validate and open an archive for download.
    ///
    /// Checks run in order: token, capability, file name and location,
    /// existence, referer, readability and size, rate limit, and finally a
    /// re-check of the resolved path just before the file is opened.
    pub fn download(&self, ctx: &RequestContext, file_name: &str) -> Result<DownloadResponse> {
        let span = ctx.span();
        let _enter = span.enter();
        self.download_inner(ctx, file_name).inspect_err(|e| log_rejection(e, file_name))
    }

    fn download_inner(&self, ctx: &RequestContext, file_name: &str) -> Result<DownloadResponse> {
        let fs = &self.services.fs;
        authorize(ctx, DOWNLOAD_ACTION, self.services.tokens.as_ref(), self.services.capabilities.as_ref())?;
        let path = self.validate_request(ctx, file_name)?;

        if !fs.is_readable(&path) {
            return Err(ExportError::Validation("export file not readable".into()));
        }
        let length = fs.size(&path).unwrap_or(0);
        if length == 0 {
            return Err(ExportError::Validation("could not determine file size".into()));
        }

        if !self.limiter.check_and_mark(ctx.user_id)? {
            return Err(ExportError::RateLimited);
        }

        self.revalidate_for_serving(&path)?;
        let body = fs.open(&path)?;
        info!(file = %file_name, bytes = length, "serving export download");
        Ok(DownloadResponse::new(file_name.to_string(), length, body))
    }

    /// Validate and delete an archive on request.
    pub fn delete(&self, ctx: &RequestContext, file_name: &str) -> Result<DeleteResponse> {
        let span = ctx.span();
        let _enter = span.enter();
        self.delete_inner(ctx, file_name).inspect_err(|e| log_rejection(e, file_name))
    }

    fn delete_inner(&self, ctx: &RequestContext, file_name: &str) -> Result<DeleteResponse> {
        authorize(ctx, DELETE_ACTION, self.services.tokens.as_ref(), self.services.capabilities.as_ref())?;
        let path = self.validate_request(ctx, file_name)?;

        let outcome = match self.services.fs.delete(&path) {
            Ok(true) => {
                info!(path = %path.display(), "manual deletion of export file");
                DeletionOutcome::Deleted(path)
            }
            Ok(false) => DeletionOutcome::AlreadyGone(path),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed manual deletion of export file");
                return Err(e.into());
            }
        };
        Ok(DeleteResponse {
            outcome,
            redirect: format!("{}{MANAGEMENT_PAGE}", self.admin_url),
        })
    }

    /// File name and location checks shared by every entry point.
    fn validate_name(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty() {
            return Err(ExportError::Validation("no file specified".into()));
        }
        if file_name.contains(['/', '\\']) {
            return Err(ExportError::Validation(format!("invalid file name '{file_name}'")));
        }
        if !is_archive_file_name(file_name) {
            return Err(ExportError::Validation(format!(
                "'{file_name}' is not an export file name"
            )));
        }

        let export_dir = &self.paths.export_dir;
        Ok(self.guard.validate(export_dir.join(file_name), export_dir)?)
    }

    /// Name, location, existence and referer checks for a request.
    fn validate_request(&self, ctx: &RequestContext, file_name: &str) -> Result<PathBuf> {
        let path = self.validate_name(file_name)?;
        if !self.services.fs.exists(&path) {
            return Err(ExportError::NotFound(path.display().to_string()));
        }
        match ctx.referer.as_deref() {
            Some(referer) if referer.starts_with(&self.admin_url) => Ok(path),
            _ => Err(ExportError::Validation("invalid request source".into())),
        }
    }

    fn revalidate_for_serving(&self, path: &Path) -> Result<()> {
        let fs = &self.services.fs;
        let export_dir = &self.paths.export_dir;
        let denied = |reason: &str| ExportError::Forbidden(format!("{reason}: {}", path.display()));

        let validated = self
            .guard
            .validate(path, export_dir)
            .map_err(|_| denied("failed serve-time path validation"))?;
        if !fs.is_file(&validated) || !fs.is_readable(&validated) {
            return Err(denied("not a readable regular file"));
        }
        match fs.canonicalize(&validated) {
            Ok(real) if real == path => Ok(()),
            _ => Err(denied("resolved path changed before serving")),
        }
    }
}

fn log_rejection(e: &ExportError, file_name: &str) {
    if e.is_security() {
        warn!(target: "security", file = %file_name, reason = %e, "request rejected");
    } else {
        warn!(file = %file_name, reason = %e, "request failed");
    }
}

impl std::fmt::Debug for ArtifactLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactLifecycle")
            .field("paths", &self.paths)
            .field("admin_url", &self.admin_url)
            .field("deletion_delay", &self.deletion_delay)
            .finish_non_exhaustive()
    }
}
