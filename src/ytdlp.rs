//! [`StreamClient`] backed by the `yt-dlp` executable.
//!
//! `yt-dlp -J` does the URL resolution (signatures, bot checks, format
//! lists); the chosen stream URLs are then fetched directly over HTTP so we
//! get per-chunk progress.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{
    Response, StatusCode,
    header::{CONTENT_RANGE, HeaderMap, HeaderName, HeaderValue, RANGE},
};
use serde::Deserialize;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    client::{ChunkCallback, ChunkProgress, StreamClient, StreamDescriptor, StreamKind, VideoInfo},
    error::ClientError,
    model::BypassToken,
    tools::{self, Tool},
};

/// Size of one ranged request. Large un-ranged requests get throttled.
const RANGE_CHUNK: u64 = 9 * 1024 * 1024;

#[derive(Deserialize)]
struct RawInfo {
    title: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_id: String,
    url: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    abr: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if c != "none")
}

impl RawFormat {
    fn into_descriptor(self) -> Option<StreamDescriptor> {
        let kind = match (has_codec(&self.vcodec), has_codec(&self.acodec)) {
            (true, true) => StreamKind::Progressive,
            (true, false) => StreamKind::VideoOnly,
            (false, true) => StreamKind::AudioOnly,
            // storyboards and other non-media entries
            (false, false) => return None,
        };
        // manifests (m3u8, dash) cannot be fetched with plain ranged GETs
        if !matches!(self.protocol.as_deref(), Some("https" | "http")) {
            return None;
        }
        Some(StreamDescriptor {
            id: self.format_id,
            kind,
            extension: self.ext.unwrap_or_default(),
            resolution: match kind {
                StreamKind::AudioOnly => None,
                _ => self.height.map(|h| format!("{h}p")),
            },
            bitrate_kbps: self.abr,
            filesize: self.filesize,
            approx_size: self.filesize_approx,
            url: self.url?,
            http_headers: self.http_headers,
        })
    }
}

/// Maps `yt-dlp -J` output into a [`VideoInfo`].
pub fn parse_info(json: &str) -> Result<VideoInfo, serde_json::Error> {
    let raw: RawInfo = serde_json::from_str(json)?;
    Ok(VideoInfo {
        title: raw.title,
        streams: raw.formats.into_iter().filter_map(RawFormat::into_descriptor).collect(),
    })
}

/// Command line for resolving `url`.
pub fn resolve_args(url: &str, bypass: Option<&BypassToken>) -> Vec<String> {
    let mut args = vec![
        "-J".to_owned(),
        "--no-playlist".to_owned(),
        "--no-warnings".to_owned(),
    ];
    if let Some(token) = bypass {
        args.push("--extractor-args".to_owned());
        args.push(format!(
            "youtube:player_client=web;po_token=web.gvs+{};visitor_data={}",
            token.po_token, token.visitor_data
        ));
    }
    args.push(url.to_owned());
    args
}

fn header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid header from yt-dlp"),
        }
    }
    map
}

/// Total length from a `Content-Range: bytes a-b/total` header.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    value.rsplit('/').next()?.trim().parse().ok()
}

/// Streams `resp` into `file`, reporting each chunk. Returns the new offset.
async fn write_body(
    stream: &StreamDescriptor,
    resp: Response,
    total: u64,
    mut downloaded: u64,
    file: &mut File,
    on_chunk: &mut ChunkCallback<'_>,
) -> Result<u64, ClientError> {
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_chunk(ChunkProgress {
            stream_id: &stream.id,
            chunk_len: chunk.len(),
            bytes_remaining: total.saturating_sub(downloaded),
            total,
        });
    }
    Ok(downloaded)
}

pub struct YtDlpClient {
    program: PathBuf,
    http: reqwest::Client,
    range_chunk: u64,
}

impl YtDlpClient {
    /// Uses the bundled `yt-dlp` or the one on `PATH`.
    pub fn new() -> Self {
        Self::with_program(Tool::YtDlp.locate())
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            program,
            http: reqwest::Client::new(),
            range_chunk: RANGE_CHUNK,
        }
    }

    /// Ranged GETs bounded by the server's `Content-Range` total.
    ///
    /// `size` only seeds the first request. A range that ends short of what
    /// was asked for is a truncated stream and fails.
    async fn fetch_ranged(
        &self,
        stream: &StreamDescriptor,
        headers: &HeaderMap,
        size: u64,
        file: &mut File,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<u64, ClientError> {
        let mut total = size;
        let mut downloaded = 0u64;
        while downloaded < total {
            let end = (downloaded + self.range_chunk - 1).min(total - 1);
            let resp = self
                .http
                .get(&stream.url)
                .headers(headers.clone())
                .header(RANGE, format!("bytes={downloaded}-{end}"))
                .send()
                .await?
                .error_for_status()?;

            if resp.status() != StatusCode::PARTIAL_CONTENT {
                // range ignored, the whole file is coming from byte 0
                if downloaded > 0 {
                    return Err(ClientError::Fetch(format!(
                        "stream {} ignored range request at byte {downloaded}",
                        stream.id
                    )));
                }
                let total = resp.content_length().unwrap_or(total);
                let written = write_body(stream, resp, total, 0, file, on_chunk).await?;
                return no_data_guard(stream, written);
            }

            if let Some(actual) = content_range_total(resp.headers()) {
                if actual != total {
                    debug!(stream = %stream.id, expected = total, actual, "size corrected by server");
                    total = actual;
                }
            }

            let before = downloaded;
            downloaded = write_body(stream, resp, total, downloaded, file, on_chunk).await?;
            if downloaded == before {
                return Err(ClientError::Fetch(format!(
                    "stream {} returned no data at byte {downloaded}",
                    stream.id
                )));
            }
            let wanted = (end + 1).min(total);
            if downloaded < wanted {
                return Err(ClientError::Fetch(format!(
                    "stream {} ended at byte {downloaded} of {total}",
                    stream.id
                )));
            }
        }
        Ok(downloaded)
    }

    /// One plain GET for streams without an exact size.
    async fn fetch_whole(
        &self,
        stream: &StreamDescriptor,
        headers: &HeaderMap,
        file: &mut File,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<u64, ClientError> {
        let resp = self
            .http
            .get(&stream.url)
            .headers(headers.clone())
            .send()
            .await?
            .error_for_status()?;
        // approximate size feeds progress only, never bounds the read
        let total = resp.content_length().or(stream.approx_size).unwrap_or(0);
        let written = write_body(stream, resp, total, 0, file, on_chunk).await?;
        no_data_guard(stream, written)
    }
}

fn no_data_guard(stream: &StreamDescriptor, written: u64) -> Result<u64, ClientError> {
    if written == 0 {
        return Err(ClientError::Fetch(format!("stream {} returned no data", stream.id)));
    }
    Ok(written)
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamClient for YtDlpClient {
    async fn resolve(&self, url: &str, bypass: Option<&BypassToken>) -> Result<VideoInfo, ClientError> {
        debug!(program = %self.program.display(), url, bypass = bypass.is_some(), "resolving");
        let output = tools::command(&self.program)
            .args(resolve_args(url, bypass))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    ClientError::Session(format!("{} not found", self.program.display()))
                }
                _ => ClientError::Session(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("yt-dlp exited without output");
            return Err(ClientError::Session(format!("{} ({})", reason.trim(), output.status)));
        }

        let info = parse_info(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| ClientError::Session(format!("unreadable yt-dlp output: {e}")))?;
        info!(title = ?info.title, streams = info.streams.len(), "resolved");
        Ok(info)
    }

    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        dest: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<u64, ClientError> {
        debug!(
            stream = %stream.id,
            dest = %dest.display(),
            size = ?stream.filesize,
            approx = ?stream.approx_size,
            "fetching"
        );
        let headers = header_map(&stream.http_headers);
        let mut file = File::create(dest).await?;
        let written = match stream.filesize {
            Some(total) if total > 0 => self.fetch_ranged(stream, &headers, total, &mut file, on_chunk).await?,
            _ => self.fetch_whole(stream, &headers, &mut file, on_chunk).await?,
        };
        file.flush().await?;
        Ok(written)
    }
}
