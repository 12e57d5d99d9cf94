use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DownloadError;

/// What the user wants out of a URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Best video and best audio, merged into one `.mp4`
    #[default]
    Mp4,
    /// Best audio only, saved as `.mp3`
    Mp3,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Mp4, OutputFormat::Mp3];

    /// File extension of the final output
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Mp4 => f.write_str("MP4 (Video + Audio)"),
            OutputFormat::Mp3 => f.write_str("MP3 (Audio Only)"),
        }
    }
}

/// Opaque token pair some videos require before they can be fetched outside a browser
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BypassToken {
    pub po_token: String,
    pub visitor_data: String,
}

impl BypassToken {
    /// Builds a token only when both halves are present.
    pub fn from_parts(po_token: &str, visitor_data: &str) -> Option<Self> {
        let po_token = po_token.trim();
        let visitor_data = visitor_data.trim();
        if po_token.is_empty() || visitor_data.is_empty() {
            return None;
        }
        Some(Self {
            po_token: po_token.to_string(),
            visitor_data: visitor_data.to_string(),
        })
    }
}

/// One download, as submitted by the UI. Moved into the worker and never changed.
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// Video URL as pasted by the user
    pub url: String,
    /// Folder the final file is written to
    pub destination: PathBuf,
    /// MP4 or MP3
    pub format: OutputFormat,
    /// Optional bot-bypass credentials
    pub bypass: Option<BypassToken>,
}

/// Progress snapshot sent to the UI
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    /// Overall progress, 0 to 100
    pub percent: f32,
    /// Human-readable status line
    pub message: String,
}

/// Terminal value of one download. Exactly one is produced per request.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadResult {
    pub success: bool,
    /// Final file, `None` on failure
    pub path: Option<PathBuf>,
    pub message: String,
}

impl DownloadResult {
    pub fn succeeded(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            success: true,
            path: Some(path),
            message: message.into(),
        }
    }

    pub fn failed(err: &DownloadError) -> Self {
        Self {
            success: false,
            path: None,
            message: err.to_string(),
        }
    }
}

/// Messages flowing from a download worker to the UI thread
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    Progress(ProgressEvent),
    Finished(DownloadResult),
}

/// Represents the current state of the download panel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DownloadStatus {
    /// Nothing has been started yet
    #[default]
    Idle,
    /// Download is in progress
    Downloading,
    /// Download has completed successfully
    Done,
    /// Download ended with an error
    Failed,
}
