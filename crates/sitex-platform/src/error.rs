use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command '{cmd}' failed to start: {source}")]
    CommandFailed {
        cmd: String,
        source: std::io::Error,
    },

    #[error("launching external commands is disabled on this host")]
    ExecDisabled,

    #[error("{0} not found on this host")]
    ToolNotFound(&'static str),

    #[error("{tool} path is not absolute: {path}")]
    NotAbsolute { tool: &'static str, path: String },

    #[error("suspicious characters in {tool} path: {path}")]
    Suspicious { tool: &'static str, path: String },

    #[error("{tool} executable missing at {}", path.display())]
    Missing { tool: &'static str, path: PathBuf },

    #[error("{tool} at {} is not executable", path.display())]
    NotExecutable { tool: &'static str, path: PathBuf },

    #[error("{} is not a valid {tool} executable", path.display())]
    IdentityMismatch { tool: &'static str, path: PathBuf },

    #[error("{0}")]
    DumpFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
