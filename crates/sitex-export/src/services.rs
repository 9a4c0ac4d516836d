use std::sync::Arc;

use sitex_fs::Filesystem;
use sitex_state::{Clock, StateStore};

use crate::access::{Capabilities, NonceTokens, RoleTable, Tokens};

/// Collaborators shared by the orchestrator and the artifact lifecycle.
#[derive(Clone)]
pub struct Services {
    pub fs: Arc<dyn Filesystem>,
    pub store: Arc<dyn StateStore>,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<dyn Tokens>,
    pub capabilities: Arc<dyn Capabilities>,
}

impl Services {
    /// Nonce tokens backed by `store`, and nobody holding any capability.
    pub fn new(fs: Arc<dyn Filesystem>, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let tokens = Arc::new(NonceTokens::new(store.clone(), clock.clone()));
        Self {
            fs,
            store,
            clock,
            tokens,
            capabilities: Arc::new(RoleTable::new()),
        }
    }

    pub fn tokens(mut self, tokens: Arc<dyn Tokens>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn capabilities(mut self, capabilities: Arc<dyn Capabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
