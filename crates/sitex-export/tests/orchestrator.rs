use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sitex_export::access::{DOWNLOAD_ACTION, EXPORT_ACTION, MANAGE_CAPABILITY};
use sitex_export::{
    ArtifactLifecycle, DeletionOutcome, ExportConfig, ExportError, ExportOrchestrator,
    ExportPaths, ExportState, GUARD_CONTENT, GUARD_FILE, NonceTokens, RequestContext, RoleTable,
    Services, Tokens,
};
use sitex_fs::DiskFs;
use sitex_guard::{dump_file_name, is_archive_file_name};
use sitex_platform::{DatabaseDumpFile, DumpDatabase};
use sitex_state::{Clock, FixedClock, JobQueue, MemoryStore, StateStore};
use tempfile::TempDir;

const ADMIN_URL: &str = "https://example.com/wp-admin/";

/// Writes a fixed SQL body the way the real tool would.
struct FakeDump;

impl DumpDatabase for FakeDump {
    fn dump(
        &self,
        target_dir: &Path,
        created_at: DateTime<Utc>,
    ) -> sitex_platform::Result<DatabaseDumpFile> {
        let file_name = dump_file_name("site", created_at);
        let path = target_dir.join(&file_name);
        fs::write(&path, "CREATE TABLE wp_options;")
            .map_err(|e| sitex_platform::Error::DumpFailed(e.to_string()))?;
        Ok(DatabaseDumpFile { file_name, path })
    }
}

struct BrokenDump;

impl DumpDatabase for BrokenDump {
    fn dump(&self, _: &Path, _: DateTime<Utc>) -> sitex_platform::Result<DatabaseDumpFile> {
        Err(sitex_platform::Error::DumpFailed(
            "Error: Error establishing a database connection.".into(),
        ))
    }
}

struct Site {
    _dir: TempDir,
    root: PathBuf,
    config: ExportConfig,
    paths: ExportPaths,
    clock: Arc<FixedClock>,
    tokens: Arc<NonceTokens>,
    services: Services,
}

impl Site {
    fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("sitex-export-")
            .tempdir()
            .expect("Failed to create temp dir");
        let root = dir.path().canonicalize().unwrap().join("www");
        for (file, body) in [
            ("index.php", "<?php require 'wp-blog-header.php';"),
            ("wp-config.php", "<?php define('DB_NAME', 'wp');"),
            ("wp-content/themes/plain/style.css", "body {}"),
            ("wp-content/cache/page.html", "<html></html>"),
            (".git/HEAD", "ref: refs/heads/main"),
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }

        let config = ExportConfig {
            site_root: root.clone(),
            upload_dir: root.join("wp-content/uploads"),
            upload_url: "https://example.com/wp-content/uploads".into(),
            admin_url: ADMIN_URL.into(),
            site_name: "My Blog".into(),
            ..ExportConfig::default()
        };
        let paths = ExportPaths::from_config(&config).unwrap();

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at_timestamp(1_704_067_200));
        let tokens = Arc::new(NonceTokens::new(store.clone(), clock.clone()));
        let services = Services::new(Arc::new(DiskFs::new()), store, clock.clone())
            .tokens(tokens.clone())
            .capabilities(Arc::new(RoleTable::new().grant(1, MANAGE_CAPABILITY)));

        Self {
            _dir: dir,
            root,
            config,
            paths,
            clock,
            tokens,
            services,
        }
    }

    fn orchestrator(&self) -> ExportOrchestrator {
        ExportOrchestrator::new(&self.config, self.paths.clone(), self.services.clone())
            .dumper(FakeDump)
    }

    fn lifecycle(&self) -> ArtifactLifecycle {
        ArtifactLifecycle::new(&self.config, self.paths.clone(), self.services.clone())
    }

    fn request(&self, action: &str) -> RequestContext {
        RequestContext::new(1)
            .ip("198.51.100.4")
            .referer(ADMIN_URL)
            .token(self.tokens.issue(action, 1).unwrap())
    }

    fn export_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.paths.export_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn archive_entries(path: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn test_export_run_produces_archive() {
    let site = Site::new();
    let mut orchestrator = site.orchestrator();

    let success = orchestrator.run(&site.request(EXPORT_ACTION)).unwrap();
    assert_eq!(orchestrator.state(), &ExportState::Done);

    assert!(is_archive_file_name(&success.file_name));
    assert!(success.file_name.contains("_My-Blog_"));
    assert!(success.path.starts_with(&site.paths.export_dir));
    assert_eq!(
        success.display_path,
        format!(
            "[wp-root]/wp-content/uploads/simple-wp-site-exporter-exports/{}",
            success.file_name
        )
    );
    assert!(success.download_url.starts_with(&format!(
        "{ADMIN_URL}?sse_secure_download={}&sse_download_nonce=",
        success.file_name
    )));
    assert!(success.delete_url.contains(&success.delete_token));
    assert!(success.deletion_scheduled);
    assert!(success.report.is_complete());

    let entries = archive_entries(&success.path);
    assert_eq!(entries[0], dump_file_name("site", site.clock.now()));
    assert!(entries.contains(&"index.php".to_string()));
    assert!(entries.contains(&"wp-content/themes/plain/style.css".to_string()));
    assert!(!entries.iter().any(|e| e.starts_with(".git")));
    assert!(!entries.iter().any(|e| e.starts_with("wp-content/cache/page")));
    assert!(!entries.iter().any(|e| e.contains("simple-wp-site-exporter-exports")));

    // Only the archive and the listing guard remain.
    assert_eq!(
        site.export_dir_entries(),
        vec![GUARD_FILE.to_string(), success.file_name.clone()]
    );
    let guard = fs::read_to_string(site.paths.export_dir.join(GUARD_FILE)).unwrap();
    assert_eq!(guard, GUARD_CONTENT);
}

#[test]
fn test_exported_archive_downloads_then_expires() {
    let site = Site::new();
    let success = site
        .orchestrator()
        .run(&site.request(EXPORT_ACTION))
        .unwrap();
    let lifecycle = site.lifecycle();

    let ctx = RequestContext::new(1)
        .referer(ADMIN_URL)
        .token(success.download_token.clone());
    let response = lifecycle.download(&ctx, &success.file_name).unwrap();
    let mut body = Vec::new();
    response.write_to(&mut body).unwrap();
    assert_eq!(body, fs::read(&success.path).unwrap());

    site.clock.advance(Duration::seconds(300));
    let runs = lifecycle.run_due().unwrap();
    assert_eq!(runs.len(), 1);
    assert!(matches!(runs[0].outcome, Ok(DeletionOutcome::Deleted(_))));
    assert!(!success.path.exists());
}

#[test]
fn test_delete_token_from_notice_removes_archive() {
    let site = Site::new();
    let success = site
        .orchestrator()
        .run(&site.request(EXPORT_ACTION))
        .unwrap();

    let ctx = RequestContext::new(1)
        .referer(ADMIN_URL)
        .token(success.delete_token.clone());
    let response = site.lifecycle().delete(&ctx, &success.file_name).unwrap();
    assert_eq!(response.outcome, DeletionOutcome::Deleted(success.path.clone()));
    assert!(!success.path.exists());

    site.clock.advance(Duration::seconds(300));
    let runs = site.lifecycle().run_due().unwrap();
    assert!(matches!(runs[0].outcome, Ok(DeletionOutcome::AlreadyGone(_))));
}

#[test]
fn test_dump_failure_stops_before_archiving() {
    let site = Site::new();
    let mut orchestrator = site.orchestrator().dumper(BrokenDump);

    let err = orchestrator.run(&site.request(EXPORT_ACTION)).unwrap_err();
    assert!(matches!(err, ExportError::DumpFailed(_)));
    assert_eq!(
        err.public_message(),
        "Error: Error establishing a database connection."
    );
    assert!(matches!(orchestrator.state(), ExportState::Failed(_)));
    assert_eq!(site.export_dir_entries(), vec![GUARD_FILE.to_string()]);
    assert!(site.lifecycle().jobs().pending().unwrap().is_empty());
}

#[test]
fn test_archive_failure_cleans_up_dump() {
    let mut site = Site::new();
    site.config.site_root = site.root.join("missing");
    let mut orchestrator = site.orchestrator();

    let err = orchestrator.run(&site.request(EXPORT_ACTION)).unwrap_err();
    assert!(matches!(err, ExportError::Traversal(_)));
    assert!(matches!(orchestrator.state(), ExportState::Failed(_)));
    assert_eq!(site.export_dir_entries(), vec![GUARD_FILE.to_string()]);
}

#[test]
fn test_export_requires_token_and_capability() {
    let site = Site::new();

    let mut orchestrator = site.orchestrator();
    let wrong = site.request(DOWNLOAD_ACTION);
    assert!(matches!(
        orchestrator.run(&wrong),
        Err(ExportError::Forbidden(_))
    ));
    assert_eq!(orchestrator.state(), &ExportState::Idle);

    let outsider = RequestContext::new(7).token(site.tokens.issue(EXPORT_ACTION, 7).unwrap());
    assert!(matches!(
        orchestrator.run(&outsider),
        Err(ExportError::Forbidden(_))
    ));
    assert!(!site.paths.export_dir.exists());
}

#[test]
fn test_unschedulable_archive_is_removed() {
    let site = Site::new();
    site.services
        .store
        .set(JobQueue::KEY, serde_json::json!("not a job list"))
        .unwrap();
    let mut orchestrator = site.orchestrator();

    let err = orchestrator.run(&site.request(EXPORT_ACTION)).unwrap_err();
    assert!(matches!(err, ExportError::State(_)));
    assert!(matches!(orchestrator.state(), ExportState::Failed(_)));
    assert_eq!(site.export_dir_entries(), vec![GUARD_FILE.to_string()]);
}
