use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::primitives::{self, AtomicWriteOptions};
use crate::{Error, Filesystem, Result, from_io};

#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// The real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskFs;

impl DiskFs {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for DiskFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_readable(&self, path: &Path) -> bool {
        primitives::is_readable(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        primitives::is_writable(path)
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).map_err(|e| from_io(path, e))?;
        if !metadata.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }
        Ok(metadata.len())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).map_err(|e| from_io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let options = AtomicWriteOptions::new();
        #[cfg(unix)]
        let options = options.permissions(FILE_MODE);
        primitives::atomic_write(path, content, options)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).map_err(|e| from_io(path, e))?;
        Ok(Box::new(file))
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => {
                return Err(Error::NotAFile(path.to_path_buf()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(from_io(path, e)),
        }

        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            // lost a race with another remover
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(Error::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
