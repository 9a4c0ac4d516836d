use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("path must be absolute: {0}")]
    NotAbsolute(PathBuf),

    #[error("too many levels of symbolic links: {0}")]
    SymlinkLoop(PathBuf),

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classify an I/O failure on `path`, keeping the common kinds distinguishable.
pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Error {
    let path = path.into();
    match err.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path),
        std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
        _ => Error::Read { path, source: err },
    }
}
