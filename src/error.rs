use thiserror::Error;

/// Everything that can end a download early.
///
/// These never cross the worker boundary as values; the orchestrator turns
/// them into a failed [`crate::model::DownloadResult`].
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("cannot create session: {0}")]
    SessionCreationFailed(String),

    #[error("cannot read title: {0}")]
    MetadataUnavailable(String),

    #[error("{0}")]
    NoStreamAvailable(&'static str),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("merge module not found: {0}")]
    MergeModuleMissing(String),

    #[error("download cancelled")]
    Cancelled,

    #[error("a download is already running")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

/// Failures reported by a [`crate::client::StreamClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The URL could not be turned into a session (bad URL, tool missing,
    /// bot check, network down).
    #[error("{0}")]
    Session(String),

    /// A stream could not be fetched.
    #[error("{0}")]
    Fetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

/// Failures reported by the [`crate::merger::Merger`].
#[derive(Debug, Error)]
pub enum MergeError {
    /// No strategy could find its executable.
    #[error("{0}")]
    ToolMissing(String),

    /// At least one strategy ran and every strategy failed.
    #[error("{}", .0.join("; "))]
    AllFailed(Vec<String>),
}

impl From<MergeError> for DownloadError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::ToolMissing(msg) => Self::MergeModuleMissing(msg),
            other @ MergeError::AllFailed(_) => Self::MergeFailed(other.to_string()),
        }
    }
}
