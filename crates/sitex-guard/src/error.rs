use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path contains a traversal sequence: {0}")]
    Traversal(String),

    #[error("path is not absolute: {0}")]
    NotAbsolute(String),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),

    #[error("file extension not allowed: {0}")]
    Extension(String),

    #[error("base directory cannot be resolved: {0}")]
    BaseUnresolved(PathBuf),

    #[error("path '{path}' resolves to '{canonical}'")]
    CanonicalMismatch { path: String, canonical: PathBuf },

    #[error("path '{path}' is outside base directory '{base}'")]
    OutsideBase { path: PathBuf, base: PathBuf },

    #[error("parent directory cannot be resolved: {0}")]
    ParentUnresolved(PathBuf),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("random source unavailable: {0}")]
    Random(String),
}

pub type Result<T> = std::result::Result<T, Error>;
