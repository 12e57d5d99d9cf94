//! Port to whatever resolves a URL into downloadable streams.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;

use crate::{error::ClientError, model::BypassToken};

/// Which tracks a stream carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    AudioOnly,
    VideoOnly,
    /// Audio and video in one file
    Progressive,
}

/// One fetchable stream offered for a video. Read-only outside the client.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamDescriptor {
    /// Client-specific identifier (yt-dlp `format_id`)
    pub id: String,
    pub kind: StreamKind,
    /// Container extension without the dot, e.g. `mp4`, `webm`, `m4a`
    pub extension: String,
    /// Video resolution label such as `1080p`
    pub resolution: Option<String>,
    /// Average audio bitrate in kbit/s
    pub bitrate_kbps: Option<f64>,
    /// Exact size in bytes when known up front
    pub filesize: Option<u64>,
    /// Estimated size; only good for progress, never as a byte bound
    pub approx_size: Option<u64>,
    pub url: String,
    /// Headers the source expects on fetch
    pub http_headers: HashMap<String, String>,
}

impl StreamDescriptor {
    /// Carries only one of audio or video and must be paired before playback
    pub fn is_adaptive(&self) -> bool {
        self.kind != StreamKind::Progressive
    }
}

/// What a resolved URL offers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub streams: Vec<StreamDescriptor>,
}

/// Handed to the fetch callback after each chunk is written
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkProgress<'a> {
    pub stream_id: &'a str,
    pub chunk_len: usize,
    pub bytes_remaining: u64,
    /// Zero when the size is unknown
    pub total: u64,
}

/// Callback invoked per downloaded chunk
pub type ChunkCallback<'a> = dyn FnMut(ChunkProgress<'_>) + Send + 'a;

#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Opens a session for `url` and lists its streams.
    async fn resolve(&self, url: &str, bypass: Option<&BypassToken>) -> Result<VideoInfo, ClientError>;

    /// Downloads `stream` to `dest`, returning the number of bytes written.
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        dest: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<u64, ClientError>;
}
