//! Launching external tools without a shell.
//!
//! - `command.rs` - process builder with captured output
//! - `locate.rs` - tool discovery and validation of the discovered binary
//! - `dump.rs` - database dump through WP-CLI

pub mod command;
pub mod dump;
pub mod error;
pub mod locate;

pub use command::{Command, combined_output};
pub use dump::{DatabaseDumpFile, DatabaseDumpRunner, DumpDatabase};
pub use error::{Error, Result};
pub use locate::{Locate, SearchDirs, SystemPath, ToolSpec, WP_CLI, discover};
