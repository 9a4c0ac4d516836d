//! Filesystem capability for the export engine.
//!
//! Every component that touches a user-influenced path goes through
//! [`Filesystem`] so that the disk can be swapped for [`MemoryFs`] in tests.
//!
//! - `disk.rs` - real filesystem
//! - `memory.rs` - in-memory fake with symlink support
//! - `primitives/` - atomic write and access probes

mod disk;
mod error;
mod memory;
pub mod primitives;

pub use disk::DiskFs;
pub use error::{Error, Result, from_io};
pub use memory::MemoryFs;
pub use primitives::{AtomicWriteOptions, atomic_write, is_executable, is_readable, is_writable};

use std::io::Read;
use std::path::{Path, PathBuf};

/// The filesystem operations the export engine is allowed to perform.
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_readable(&self, path: &Path) -> bool;

    fn is_writable(&self, path: &Path) -> bool;

    fn size(&self, path: &Path) -> Result<u64>;

    /// Resolve symlinks and `.`/`..` segments. Fails when any component is missing.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn write(&self, path: &Path, content: &[u8]) -> Result<()>;

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Remove a regular file. Returns `Ok(false)` if it was already gone.
    fn delete(&self, path: &Path) -> Result<bool>;
}

impl<F: Filesystem + ?Sized> Filesystem for &F {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn is_readable(&self, path: &Path) -> bool {
        (**self).is_readable(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        (**self).is_writable(path)
    }

    fn size(&self, path: &Path) -> Result<u64> {
        (**self).size(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        (**self).canonicalize(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (**self).create_dir_all(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        (**self).write(path, content)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        (**self).open(path)
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        (**self).delete(path)
    }
}

impl<F: Filesystem + ?Sized> Filesystem for std::sync::Arc<F> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn is_readable(&self, path: &Path) -> bool {
        (**self).is_readable(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        (**self).is_writable(path)
    }

    fn size(&self, path: &Path) -> Result<u64> {
        (**self).size(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        (**self).canonicalize(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (**self).create_dir_all(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        (**self).write(path, content)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        (**self).open(path)
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        (**self).delete(path)
    }
}
