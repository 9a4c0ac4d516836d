//! Site archiving.
//!
//! [`ArchiveBuilder`] writes one zip per run: the database dump first, then
//! the site tree in parent-before-child order, minus whatever
//! [`ExclusionFilter`] rejects. Structural failures abort the build;
//! failures on single entries are logged and recorded in the [`BuildReport`].

pub use builder::{ArchiveArtifact, ArchiveBuilder};
pub use error::{Error, Result};
pub use filter::{ExclusionFilter, ExclusionRule, classify, should_exclude};
pub use options::{BuildOptions, Compression};
pub use report::{BuildReport, EntryFailure, EntryFailureKind};

mod builder;
mod error;
mod filter;
mod options;
mod report;
