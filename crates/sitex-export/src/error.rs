/// Failures surfaced by export runs and artifact requests.
///
/// The `Display` text carries full detail for logs. Requesters only ever
/// see [`ExportError::public_message`], which never includes a path.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `message` is the fixed text shown to requesters, `detail` goes to logs.
    #[error("database tool unavailable: {detail}")]
    ToolUnavailable {
        message: &'static str,
        detail: String,
    },

    #[error("database export failed: {0}")]
    DumpFailed(String),

    #[error("could not create archive: {0}")]
    ArchiveOpen(String),

    #[error("could not finalize archive: {0}")]
    ArchiveFinalize(String),

    #[error("traversal of the site tree failed: {0}")]
    Traversal(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("download rate limit exceeded")]
    RateLimited,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Fs(#[from] sitex_fs::Error),

    #[error(transparent)]
    State(#[from] sitex_state::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// HTTP-style status for request handlers.
    pub fn status(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            Self::Validation(_) | Self::NotFound(_) => 404,
            Self::RateLimited => 429,
            _ => 500,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Self::Forbidden(_) => "Security check failed. Please try again.".into(),
            Self::Validation(_) => "Invalid export file request.".into(),
            Self::NotFound(_) => "Export file not found.".into(),
            Self::RateLimited => {
                "Too many download requests. Please wait before trying again.".into()
            }
            Self::Configuration(_) => {
                "Could not determine the upload directory or URL.".into()
            }
            Self::ToolUnavailable { message, .. } => (*message).into(),
            Self::DumpFailed(output) => output.clone(),
            Self::ArchiveOpen(_) => "Could not create the archive file.".into(),
            Self::ArchiveFinalize(_) => "Failed to finalize the archive file.".into(),
            Self::Traversal(_) => "Failed to read the site files.".into(),
            Self::Fs(_) | Self::State(_) => "The operation could not be completed.".into(),
        }
    }

    /// Rejections that belong in the security log.
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            Self::Forbidden(_) | Self::Validation(_) | Self::RateLimited
        )
    }
}

impl From<sitex_platform::Error> for ExportError {
    fn from(e: sitex_platform::Error) -> Self {
        use sitex_platform::Error as P;
        if let P::DumpFailed(output) = e {
            return Self::DumpFailed(output);
        }
        let message = match &e {
            P::ExecDisabled => "Launching external commands is disabled on this server.",
            P::CommandFailed { .. } | P::DumpFailed(_) => "WP-CLI could not be started.",
            P::ToolNotFound(_) => "WP-CLI not found on this server.",
            P::NotAbsolute { .. } => "WP-CLI path is not absolute.",
            P::Suspicious { .. } => "Suspicious characters detected in WP-CLI path.",
            P::Missing { .. } => "WP-CLI executable not found at detected path.",
            P::NotExecutable { .. } => "WP-CLI file is not executable.",
            P::IdentityMismatch { .. } => "Detected file is not a valid WP-CLI executable.",
        };
        Self::ToolUnavailable {
            message,
            detail: e.to_string(),
        }
    }
}

impl From<sitex_archive::Error> for ExportError {
    fn from(e: sitex_archive::Error) -> Self {
        use sitex_archive::Error as A;
        match e {
            A::Location(_) | A::Open { .. } | A::Dump { .. } => Self::ArchiveOpen(e.to_string()),
            A::SourceRoot { .. } | A::Traversal { .. } => Self::Traversal(e.to_string()),
            A::Finalize { .. } | A::Missing(_) => Self::ArchiveFinalize(e.to_string()),
        }
    }
}

impl From<sitex_guard::Error> for ExportError {
    fn from(e: sitex_guard::Error) -> Self {
        Self::Validation(e.to_string())
    }
}
