use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sitex_export::access::MANAGE_CAPABILITY;
use sitex_export::{
    ArtifactLifecycle, ExportConfig, ExportOrchestrator, ExportPaths, RequestContext, RoleTable,
    Services,
};
use sitex_fs::DiskFs;
use sitex_state::{Clock, JsonFileStore, LogRing, StateStore, SystemClock};

/// Address recorded for requests made from this command line.
const LOCAL_IP: &str = "127.0.0.1";

/// Everything a command needs, wired from the loaded configuration.
pub struct Host {
    pub config: ExportConfig,
    pub paths: ExportPaths,
    pub services: Services,
    pub ring: LogRing,
}

impl Host {
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = ExportConfig::load(config_path).context("failed to load configuration")?;

        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::open(config.state_file()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ring = LogRing::new(store.clone(), clock.clone());
        sitex_state::log::init(&config.log_filter, ring.clone())?;

        let paths = ExportPaths::from_config(&config)?;
        let roles = RoleTable::new().grant(config.operator_user_id, MANAGE_CAPABILITY);
        let services =
            Services::new(Arc::new(DiskFs::new()), store, clock).capabilities(Arc::new(roles));

        Ok(Self {
            config,
            paths,
            services,
            ring,
        })
    }

    /// A request from the operator carrying a fresh token for `action`.
    pub fn request(&self, action: &str) -> anyhow::Result<RequestContext> {
        let user = self.config.operator_user_id;
        let token = self.services.tokens.issue(action, user)?;
        Ok(RequestContext::new(user)
            .ip(LOCAL_IP)
            .referer(self.config.admin_url.clone())
            .token(token))
    }

    pub fn orchestrator(&self) -> ExportOrchestrator {
        ExportOrchestrator::new(&self.config, self.paths.clone(), self.services.clone())
    }

    pub fn lifecycle(&self) -> ArtifactLifecycle {
        ArtifactLifecycle::new(&self.config, self.paths.clone(), self.services.clone())
    }
}
