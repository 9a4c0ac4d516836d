//! Site export runs and the lifecycle of the archives they produce.
//!
//! [`ExportOrchestrator`] drives a single run from database dump to a
//! scheduled deletion. [`ArtifactLifecycle`] serves the requests that come
//! afterwards: download, manual deletion, and the timed deletion job. Both
//! take their collaborators from [`Services`] so hosts and tests can swap
//! the filesystem, state store, clock, tokens and capabilities.

pub mod access;
pub mod config;
mod download;
mod error;
mod lifecycle;
mod orchestrator;
mod paths;
mod services;

pub use access::{Capabilities, NonceTokens, RequestContext, RoleTable, Tokens};
pub use config::{ExportConfig, TimeLimit};
pub use download::{DownloadResponse, content_type};
pub use error::{ExportError, Result};
pub use lifecycle::{
    ArtifactLifecycle, DELETE_HOOK, DeleteResponse, DeletionOutcome, JobRun, MANAGEMENT_PAGE,
};
pub use orchestrator::{ExportOrchestrator, ExportState, ExportSuccess, TARGET_EXECUTION_TIME};
pub use paths::{ExportPaths, GUARD_CONTENT, GUARD_FILE};
pub use services::Services;
