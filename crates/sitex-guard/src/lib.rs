//! Path safety checks and artifact naming.
//!
//! Every path that a request can influence goes through [`PathGuard`] before
//! it is read, written, or deleted. Archive names follow a fixed grammar
//! ([`is_archive_file_name`]) so that names coming back from requests can be
//! checked before they are joined onto any directory.

pub use error::{Error, Result};
pub use guard::{ALLOWED_EXTENSIONS, PathGuard, within_base};
pub use naming::{
    ARCHIVE_PREFIX, TIMESTAMP_FORMAT, archive_file_name, dump_file_name, is_archive_file_name,
    new_archive_file_name, random_tag, sanitize_file_name, sanitize_site_name, timestamp,
};

mod error;
mod guard;
mod naming;
