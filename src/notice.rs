//! Text and lifetime of the messages shown after a download ends.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use crate::{logging::LOG_FILE, model::DownloadResult};

/// Longest failure text shown in the status line
pub const STATUS_MAX_CHARS: usize = 80;
/// Longest failure text shown in a notice
pub const NOTICE_MAX_CHARS: usize = 100;
/// How long a notice stays on screen
pub const NOTICE_DURATION: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

/// A transient banner
#[derive(Clone, Debug)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: &'static str,
    pub text: String,
    expires_at: Instant,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: &'static str, text: impl Into<String>) -> Self {
        Self {
            kind,
            title,
            text: text.into(),
            expires_at: Instant::now() + NOTICE_DURATION,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Banner for a finished download.
    pub fn for_result(result: &DownloadResult) -> Self {
        if result.success {
            let name = result
                .path
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Self::new(NoticeKind::Success, "Success", format!("Download complete: {name}"))
        } else {
            Self::new(NoticeKind::Error, "Failed", notice_text(&result.message))
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> Option<String> {
    if text.chars().count() <= max {
        return None;
    }
    Some(text.chars().take(max).collect())
}

/// Status line text: long failures are cut with an ellipsis.
pub fn status_text(result: &DownloadResult) -> String {
    if result.success {
        return result.message.clone();
    }
    match truncate_chars(&result.message, STATUS_MAX_CHARS) {
        Some(short) => format!("{short}..."),
        None => result.message.clone(),
    }
}

/// Notice text for a failure, pointing at the log when cut.
pub fn notice_text(message: &str) -> String {
    match truncate_chars(message, NOTICE_MAX_CHARS) {
        Some(short) => format!("{short}... (see {LOG_FILE} for details)"),
        None => message.to_string(),
    }
}
