use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read state file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to persist state: {0}")]
    Persist(#[from] sitex_fs::Error),

    #[error("state value under '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
