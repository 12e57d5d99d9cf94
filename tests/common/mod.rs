#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;

use yt_grab::{
    client::{ChunkCallback, ChunkProgress, StreamClient, StreamDescriptor, StreamKind, VideoInfo},
    error::ClientError,
    merger::{MergeStrategy, Merger, StrategyFailure},
    model::{BypassToken, WorkerEvent},
    progress::ProgressReporter,
};

pub fn video(id: &str, resolution: &str) -> StreamDescriptor {
    StreamDescriptor {
        id: id.to_string(),
        kind: StreamKind::VideoOnly,
        extension: "mp4".to_string(),
        resolution: Some(resolution.to_string()),
        bitrate_kbps: None,
        filesize: Some(4_000),
        approx_size: None,
        url: format!("https://media.invalid/{id}"),
        http_headers: HashMap::new(),
    }
}

pub fn audio(id: &str, kbps: f64) -> StreamDescriptor {
    StreamDescriptor {
        id: id.to_string(),
        kind: StreamKind::AudioOnly,
        extension: "m4a".to_string(),
        resolution: None,
        bitrate_kbps: Some(kbps),
        filesize: Some(2_000),
        approx_size: None,
        url: format!("https://media.invalid/{id}"),
        http_headers: HashMap::new(),
    }
}

pub fn info(title: &str, streams: Vec<StreamDescriptor>) -> VideoInfo {
    VideoInfo {
        title: Some(title.to_string()),
        streams,
    }
}

/// In-memory client: resolves to a fixed answer and writes dummy bytes on fetch.
#[derive(Default)]
pub struct FakeClient {
    pub info: VideoInfo,
    pub resolve_error: Option<String>,
    pub fetch_error: Option<String>,
    pub fetch_delay: Option<Duration>,
    pub fetch_panics: bool,
    pub fetched: Mutex<Vec<String>>,
    pub completed_fetches: AtomicUsize,
    pub seen_bypass: Mutex<Option<BypassToken>>,
}

impl FakeClient {
    pub fn with_info(info: VideoInfo) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamClient for FakeClient {
    async fn resolve(&self, _url: &str, bypass: Option<&BypassToken>) -> Result<VideoInfo, ClientError> {
        *self.seen_bypass.lock().unwrap() = bypass.cloned();
        match &self.resolve_error {
            Some(msg) => Err(ClientError::Session(msg.clone())),
            None => Ok(self.info.clone()),
        }
    }

    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        dest: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<u64, ClientError> {
        self.fetched.lock().unwrap().push(stream.id.clone());
        if self.fetch_panics {
            panic!("fake client blew up fetching {}", stream.id);
        }
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        // partial file first, so failures leave something to clean up
        tokio::fs::write(dest, b"partial").await?;
        if let Some(msg) = &self.fetch_error {
            return Err(ClientError::Fetch(msg.clone()));
        }

        let total = stream.filesize.unwrap_or(1_000);
        let chunk = total / 4;
        let mut remaining = total;
        while remaining > 0 {
            let len = chunk.min(remaining);
            remaining -= len;
            on_chunk(ChunkProgress {
                stream_id: &stream.id,
                chunk_len: len as usize,
                bytes_remaining: remaining,
                total,
            });
        }
        tokio::fs::write(dest, stream.id.as_bytes()).await?;
        self.completed_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(total)
    }
}

/// Merge strategy that records what it saw and either writes the output or fails.
pub struct FakeMerge {
    pub outcome: fn() -> Result<(), StrategyFailure>,
    pub calls: Arc<AtomicUsize>,
    pub inputs_existed: Arc<Mutex<Vec<bool>>>,
}

#[async_trait]
impl MergeStrategy for FakeMerge {
    fn name(&self) -> &str {
        "fake"
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), StrategyFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs_existed
            .lock()
            .unwrap()
            .push(video.exists() && audio.exists());
        (self.outcome)()?;
        std::fs::write(output, b"merged").map_err(|e| StrategyFailure::Failed(e.to_string()))
    }
}

pub struct MergeLog {
    pub calls: Arc<AtomicUsize>,
    pub inputs_existed: Arc<Mutex<Vec<bool>>>,
}

pub fn merger(outcome: fn() -> Result<(), StrategyFailure>) -> (Merger, MergeLog) {
    let calls = Arc::new(AtomicUsize::new(0));
    let inputs_existed = Arc::new(Mutex::new(Vec::new()));
    let strategy: Box<dyn MergeStrategy> = Box::new(FakeMerge {
        outcome,
        calls: calls.clone(),
        inputs_existed: inputs_existed.clone(),
    });
    (Merger::new(vec![strategy]), MergeLog { calls, inputs_existed })
}

pub fn merge_ok() -> Result<(), StrategyFailure> {
    Ok(())
}

pub fn reporter() -> (ProgressReporter, UnboundedReceiver<WorkerEvent>, CancellationToken) {
    let (tx, rx) = unbounded_channel();
    let cancel = CancellationToken::new();
    (ProgressReporter::new(tx, cancel.clone()), rx, cancel)
}

/// Progress percentages received so far, in order.
pub fn drain_percents(rx: &mut UnboundedReceiver<WorkerEvent>) -> Vec<f32> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let WorkerEvent::Progress(p) = event {
            out.push(p.percent);
        }
    }
    out
}

/// Names of `temp_*` files left in `dir`.
pub fn leftover_temp_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("temp_"))
        .collect()
}
