//! The download pipeline: resolve, pick streams, fetch, merge.

use std::{path::PathBuf, sync::Arc};

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{
    client::{ChunkProgress, StreamClient, StreamDescriptor, VideoInfo},
    error::DownloadError,
    merger::Merger,
    model::{DownloadRequest, DownloadResult, OutputFormat, WorkerEvent},
    progress::{ProgressBand, ProgressReporter, stream_percent},
    sanitize::sanitize_filename,
    scratch::{self, ScratchFile},
    selection::{pick_audio_stream, pick_video_stream},
};

const NO_AUDIO: &str = "no audio stream available";
const NO_PAIR: &str = "no suitable video/audio stream";

/// File stem used when the title sanitizes down to nothing
const FALLBACK_STEM: &str = "download";

/// Runs one request to completion on the current task.
///
/// Progress goes through `reporter`; the returned result is the single
/// terminal value for the request. Errors never escape as panics or `Err`.
#[instrument(skip_all, fields(url = %request.url, format = ?request.format))]
pub async fn run_download(
    request: &DownloadRequest,
    client: &dyn StreamClient,
    merger: &Merger,
    reporter: &ProgressReporter,
) -> DownloadResult {
    match execute(request, client, merger, reporter).await {
        Ok((path, message)) => {
            reporter.progress(100.0, "Done!");
            info!(path = %path.display(), "download finished");
            DownloadResult::succeeded(path, message)
        }
        Err(err) => {
            error!(error = %err, "download failed");
            DownloadResult::failed(&err)
        }
    }
}

/// Spawns [`run_download`] on the runtime behind `runtime` and sends its
/// progress and final result down `tx`.
pub fn spawn_download(
    runtime: &tokio::runtime::Handle,
    request: DownloadRequest,
    client: Arc<dyn StreamClient>,
    merger: Arc<Merger>,
    tx: UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let reporter = ProgressReporter::new(tx, cancel);
        let result = run_download(&request, client.as_ref(), &merger, &reporter).await;
        reporter.finish(result);
    })
}

fn ensure_not_cancelled(reporter: &ProgressReporter) -> Result<(), DownloadError> {
    if reporter.is_cancelled() {
        warn!("stop requested, abandoning download");
        return Err(DownloadError::Cancelled);
    }
    Ok(())
}

async fn execute(
    request: &DownloadRequest,
    client: &dyn StreamClient,
    merger: &Merger,
    reporter: &ProgressReporter,
) -> Result<(PathBuf, &'static str), DownloadError> {
    reporter.progress(0.0, "Analyzing video...");

    let info = client
        .resolve(&request.url, request.bypass.as_ref())
        .await
        .map_err(|e| DownloadError::SessionCreationFailed(e.to_string()))?;

    let title = info
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DownloadError::MetadataUnavailable("video has no title".to_string()))?
        .to_string();

    let mut stem = sanitize_filename(&title);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    ensure_not_cancelled(reporter)?;

    tokio::fs::create_dir_all(&request.destination).await?;
    reporter.progress(10.0, format!("Starting download: {title}"));

    match request.format {
        OutputFormat::Mp3 => download_audio(request, &info, &stem, client, reporter).await,
        OutputFormat::Mp4 => download_video(request, &info, &stem, client, merger, reporter).await,
    }
}

async fn fetch_into(
    client: &dyn StreamClient,
    stream: &StreamDescriptor,
    scratch: &ScratchFile,
    band: ProgressBand,
    label: &str,
    reporter: &ProgressReporter,
) -> Result<u64, DownloadError> {
    let mut on_chunk = |chunk: ChunkProgress<'_>| {
        if let Some(percent) = stream_percent(chunk.total, chunk.bytes_remaining) {
            reporter.progress(band.map(percent), format!("{label}... {percent:.1}%"));
        }
    };
    let bytes = client
        .fetch(stream, scratch.path(), &mut on_chunk)
        .await
        .map_err(|e| DownloadError::DownloadFailed(e.to_string()))?;
    info!(stream = %stream.id, bytes, "stream downloaded");
    Ok(bytes)
}

/// Best audio, relabelled as `.mp3`. No transcoding happens.
async fn download_audio(
    request: &DownloadRequest,
    info: &VideoInfo,
    stem: &str,
    client: &dyn StreamClient,
    reporter: &ProgressReporter,
) -> Result<(PathBuf, &'static str), DownloadError> {
    let stream = pick_audio_stream(&info.streams).ok_or(DownloadError::NoStreamAvailable(NO_AUDIO))?;

    let ext = if stream.extension.is_empty() { "mp4" } else { stream.extension.as_str() };
    let audio_tmp = ScratchFile::new(&request.destination, "temp_a", &scratch::new_token(), ext);
    fetch_into(client, stream, &audio_tmp, ProgressBand::DOWNLOAD, "Downloading", reporter).await?;
    ensure_not_cancelled(reporter)?;

    let target = request
        .destination
        .join(format!("{stem}.{}", OutputFormat::Mp3.extension()));
    let path = audio_tmp.persist(&target)?;
    Ok((path, "Download complete."))
}

/// Best video and best audio, fetched one after the other and merged.
async fn download_video(
    request: &DownloadRequest,
    info: &VideoInfo,
    stem: &str,
    client: &dyn StreamClient,
    merger: &Merger,
    reporter: &ProgressReporter,
) -> Result<(PathBuf, &'static str), DownloadError> {
    let (Some(video), Some(audio)) = (pick_video_stream(&info.streams), pick_audio_stream(&info.streams)) else {
        return Err(DownloadError::NoStreamAvailable(NO_PAIR));
    };

    let resolution = video.resolution.as_deref().unwrap_or("unknown");
    reporter.progress(10.0, format!("Downloading video ({resolution})"));

    // one token for both files; they are removed on every exit path
    let token = scratch::new_token();
    let video_tmp = ScratchFile::new(&request.destination, "temp_v", &token, "mp4");
    let audio_tmp = ScratchFile::new(&request.destination, "temp_a", &token, "mp4");

    fetch_into(client, video, &video_tmp, ProgressBand::VIDEO, "Downloading video", reporter).await?;
    ensure_not_cancelled(reporter)?;

    reporter.progress(ProgressBand::AUDIO_AFTER_VIDEO.start, "Downloading audio");
    fetch_into(client, audio, &audio_tmp, ProgressBand::AUDIO_AFTER_VIDEO, "Downloading audio", reporter).await?;
    ensure_not_cancelled(reporter)?;

    reporter.progress(ProgressBand::AUDIO_AFTER_VIDEO.end, "Merging...");
    let output = request
        .destination
        .join(format!("{stem}.{}", OutputFormat::Mp4.extension()));
    let report = merger
        .merge(video_tmp.path(), audio_tmp.path(), &output)
        .await?;
    info!(strategy = %report.strategy, "merge done");

    Ok((output, "Download and merge complete!"))
}
