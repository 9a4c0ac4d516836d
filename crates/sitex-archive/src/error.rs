use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive location rejected: {0}")]
    Location(#[from] sitex_guard::Error),

    #[error("source root '{path}' is not accessible: {source}")]
    SourceRoot {
        path: PathBuf,
        source: sitex_fs::Error,
    },

    #[error("failed to open archive '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to add database dump '{path}' to the archive: {detail}")]
    Dump { path: PathBuf, detail: String },

    #[error("traversal of '{path}' failed: {source}")]
    Traversal {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("failed to finalize archive '{path}': {source}")]
    Finalize {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("archive '{0}' does not exist after finalizing")]
    Missing(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
