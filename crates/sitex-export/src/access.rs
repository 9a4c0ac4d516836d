//! Request identity, capability checks and action tokens.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sitex_state::{Clock, StateStore, load};
use tracing::{Span, info_span};

use crate::{ExportError, Result};

pub const MANAGE_CAPABILITY: &str = "manage_options";

pub const EXPORT_ACTION: &str = "sse_export_action";
pub const DOWNLOAD_ACTION: &str = "sse_secure_download";
pub const DELETE_ACTION: &str = "sse_delete_export";

/// Who is asking, from where, and with which token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: u64,
    pub ip: Option<String>,
    pub referer: Option<String>,
    pub token: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Span whose fields tag every log entry emitted while handling the request.
    pub fn span(&self) -> Span {
        info_span!(
            "request",
            user_id = self.user_id,
            ip = self.ip.as_deref().unwrap_or("unknown")
        )
    }
}

pub trait Capabilities: Send + Sync {
    fn user_can(&self, user_id: u64, capability: &str) -> bool;
}

/// Fixed user-to-capability grants.
#[derive(Clone, Debug, Default)]
pub struct RoleTable {
    grants: BTreeMap<u64, BTreeSet<String>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: u64, capability: impl Into<String>) -> Self {
        self.grants
            .entry(user_id)
            .or_default()
            .insert(capability.into());
        self
    }
}

impl Capabilities for RoleTable {
    fn user_can(&self, user_id: u64, capability: &str) -> bool {
        self.grants
            .get(&user_id)
            .is_some_and(|caps| caps.contains(capability))
    }
}

/// Issues and checks tokens bound to one action and one user.
pub trait Tokens: Send + Sync {
    fn issue(&self, action: &str, user_id: u64) -> Result<String>;

    fn verify(&self, token: &str, action: &str, user_id: u64) -> bool;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Nonce {
    action: String,
    user_id: u64,
    expires: i64,
}

/// Random tokens persisted in the state store until they expire.
#[derive(Clone)]
pub struct NonceTokens {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl NonceTokens {
    pub const KEY: &'static str = "nonces";

    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            lifetime: Duration::hours(24),
        }
    }

    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
}

impl Tokens for NonceTokens {
    fn issue(&self, action: &str, user_id: u64) -> Result<String> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| ExportError::Configuration(format!("random source unavailable: {e}")))?;
        let token = hex::encode(bytes);

        let now = self.clock.now().timestamp();
        let nonce = serde_json::to_value(Nonce {
            action: action.to_string(),
            user_id,
            expires: now + self.lifetime.num_seconds(),
        })
        .map_err(sitex_state::Error::from)?;

        self.store.update(Self::KEY, &mut |current| {
            let mut nonces = match current {
                Some(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            nonces.retain(|_, v| {
                v.get("expires")
                    .and_then(serde_json::Value::as_i64)
                    .is_some_and(|expires| expires > now)
            });
            nonces.insert(token.clone(), nonce.clone());
            Some(serde_json::Value::Object(nonces))
        })?;
        Ok(token)
    }

    fn verify(&self, token: &str, action: &str, user_id: u64) -> bool {
        let Ok(Some(nonces)) = load::<BTreeMap<String, Nonce>>(self.store.as_ref(), Self::KEY) else {
            return false;
        };
        nonces.get(token).is_some_and(|nonce| {
            nonce.action == action
                && nonce.user_id == user_id
                && nonce.expires > self.clock.now().timestamp()
        })
    }
}

impl std::fmt::Debug for NonceTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceTokens")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Check the token for `action` and the management capability.
pub(crate) fn authorize(
    ctx: &RequestContext,
    action: &str,
    tokens: &dyn Tokens,
    capabilities: &dyn Capabilities,
) -> Result<()> {
    let token_ok = ctx
        .token
        .as_deref()
        .is_some_and(|token| tokens.verify(token, action, ctx.user_id));
    if !token_ok {
        return Err(ExportError::Forbidden(format!("invalid token for {action}")));
    }
    if !capabilities.user_can(ctx.user_id, MANAGE_CAPABILITY) {
        return Err(ExportError::Forbidden(format!(
            "user {} lacks {MANAGE_CAPABILITY}",
            ctx.user_id
        )));
    }
    Ok(())
}
