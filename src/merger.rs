//! Muxing a video-only and an audio-only file into one MP4.
//!
//! The [`Merger`] walks an ordered list of [`MergeStrategy`]s and stops at
//! the first one that succeeds. The default list is a lossless stream copy
//! followed by a full H.264/AAC re-encode.

use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    error::MergeError,
    tools::{self, Tool},
};

/// Why a single strategy gave up
#[derive(Debug)]
pub enum StrategyFailure {
    /// Executable (or library) not available
    Missing(String),
    /// It ran and failed
    Failed(String),
}

#[async_trait]
pub trait MergeStrategy: Send + Sync {
    /// Short label used in logs and error messages
    fn name(&self) -> &str;

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), StrategyFailure>;
}

/// Which strategy produced the output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeReport {
    pub strategy: String,
}

pub struct Merger {
    strategies: Vec<Box<dyn MergeStrategy>>,
}

impl Merger {
    pub fn new(strategies: Vec<Box<dyn MergeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Stream copy, then re-encode, both with the bundled ffmpeg when present.
    pub fn with_default_strategies() -> Self {
        Self::ffmpeg(Tool::Ffmpeg.locate())
    }

    /// Stream copy then re-encode, both through `program`.
    pub fn ffmpeg(program: PathBuf) -> Self {
        let strategies: Vec<Box<dyn MergeStrategy>> = vec![
            Box::new(FfmpegStreamCopy::new(program.clone())),
            Box::new(FfmpegReencode::new(program)),
        ];
        Self::new(strategies)
    }

    pub async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<MergeReport, MergeError> {
        let mut reasons = Vec::with_capacity(self.strategies.len());
        let mut ran_any = false;

        for strategy in &self.strategies {
            match strategy.merge(video, audio, output).await {
                Ok(()) => {
                    info!(strategy = strategy.name(), output = %output.display(), "merged");
                    return Ok(MergeReport {
                        strategy: strategy.name().to_string(),
                    });
                }
                Err(StrategyFailure::Missing(reason)) => {
                    warn!(strategy = strategy.name(), %reason, "merge strategy unavailable");
                    reasons.push(format!("{}: {reason}", strategy.name()));
                }
                Err(StrategyFailure::Failed(reason)) => {
                    warn!(strategy = strategy.name(), %reason, "merge strategy failed");
                    ran_any = true;
                    reasons.push(format!("{}: {reason}", strategy.name()));
                }
            }
        }

        if ran_any {
            Err(MergeError::AllFailed(reasons))
        } else {
            Err(MergeError::ToolMissing(reasons.join("; ")))
        }
    }
}

/// Runs ffmpeg with `args` and maps the outcome.
async fn run_ffmpeg(program: &Path, args: &[&OsStr]) -> Result<(), StrategyFailure> {
    let output = tools::command(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StrategyFailure::Missing(format!("{} not found", program.display())),
            _ => StrategyFailure::Failed(e.to_string()),
        })?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string();
    Err(StrategyFailure::Failed(format!("{} ({tail})", output.status)))
}

/// `-c:v copy -c:a aac`: video untouched, audio to AAC. Near-instant.
pub struct FfmpegStreamCopy {
    program: PathBuf,
}

impl FfmpegStreamCopy {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl MergeStrategy for FfmpegStreamCopy {
    fn name(&self) -> &str {
        "ffmpeg stream copy"
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), StrategyFailure> {
        let args = [
            OsStr::new("-y"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            audio.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            output.as_os_str(),
        ];
        run_ffmpeg(&self.program, &args).await
    }
}

/// Full H.264 + AAC re-encode. Slow, but copes with inputs the copy rejects.
pub struct FfmpegReencode {
    program: PathBuf,
}

impl FfmpegReencode {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl MergeStrategy for FfmpegReencode {
    fn name(&self) -> &str {
        "ffmpeg re-encode"
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), StrategyFailure> {
        let args = [
            OsStr::new("-y"),
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            audio.as_os_str(),
            OsStr::new("-map"),
            OsStr::new("0:v:0"),
            OsStr::new("-map"),
            OsStr::new("1:a:0"),
            OsStr::new("-c:v"),
            OsStr::new("libx264"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            output.as_os_str(),
        ];
        run_ffmpeg(&self.program, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    struct Scripted {
        name: &'static str,
        outcome: fn() -> Result<(), StrategyFailure>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MergeStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn merge(&self, _video: &Path, _audio: &Path, _output: &Path) -> Result<(), StrategyFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn scripted(name: &'static str, outcome: fn() -> Result<(), StrategyFailure>) -> (Box<dyn MergeStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Scripted {
                name,
                outcome,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn paths() -> (PathBuf, PathBuf, PathBuf) {
        ("v.mp4".into(), "a.mp4".into(), "out.mp4".into())
    }

    #[tokio::test]
    async fn falls_back_after_non_zero_exit() {
        let (first, first_calls) = scripted("copy", || Err(StrategyFailure::Failed("exit status: 1".into())));
        let (second, second_calls) = scripted("reencode", || Ok(()));
        let merger = Merger::new(vec![first, second]);
        let (v, a, o) = paths();

        let report = merger.merge(&v, &a, &o).await.unwrap();
        assert_eq!(report.strategy, "reencode");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_success_skips_the_rest() {
        let (first, _) = scripted("copy", || Ok(()));
        let (second, second_calls) = scripted("reencode", || Ok(()));
        let merger = Merger::new(vec![first, second]);
        let (v, a, o) = paths();

        assert_eq!(merger.merge(&v, &a, &o).await.unwrap().strategy, "copy");
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn aggregates_every_failure() {
        let (first, _) = scripted("copy", || Err(StrategyFailure::Failed("bad codec".into())));
        let (second, _) = scripted("reencode", || Err(StrategyFailure::Missing("ffmpeg not found".into())));
        let merger = Merger::new(vec![first, second]);
        let (v, a, o) = paths();

        match merger.merge(&v, &a, &o).await.unwrap_err() {
            MergeError::AllFailed(reasons) => {
                assert_eq!(reasons, ["copy: bad codec", "reencode: ffmpeg not found"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_missing_is_tool_missing() {
        let (first, _) = scripted("copy", || Err(StrategyFailure::Missing("nope".into())));
        let merger = Merger::new(vec![first]);
        let (v, a, o) = paths();
        assert!(matches!(merger.merge(&v, &a, &o).await, Err(MergeError::ToolMissing(_))));
    }

    #[tokio::test]
    async fn missing_ffmpeg_binary_reports_missing() {
        let strategy = FfmpegStreamCopy::new(PathBuf::from("yt-grab-definitely-missing-ffmpeg"));
        let (v, a, o) = paths();
        let err = strategy.merge(&v, &a, &o).await.unwrap_err();
        assert!(matches!(err, StrategyFailure::Missing(_)));
    }

    #[tokio::test]
    async fn both_ffmpeg_strategies_share_one_program() {
        let merger = Merger::ffmpeg(PathBuf::from("yt-grab-bundled-ffmpeg"));
        let (v, a, o) = paths();

        match merger.merge(&v, &a, &o).await.unwrap_err() {
            MergeError::ToolMissing(reason) => {
                assert!(reason.starts_with("ffmpeg stream copy: yt-grab-bundled-ffmpeg"), "{reason}");
                assert!(reason.contains("ffmpeg re-encode: yt-grab-bundled-ffmpeg"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn default_strategies_use_the_located_ffmpeg() {
        let merger = Merger::with_default_strategies();
        let names: Vec<_> = merger.strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["ffmpeg stream copy", "ffmpeg re-encode"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_non_zero_exit_triggers_fallback() {
        // `false` ignores its arguments and exits 1
        let (second, second_calls) = scripted("reencode", || Ok(()));
        let copy: Box<dyn MergeStrategy> = Box::new(FfmpegStreamCopy::new(PathBuf::from("false")));
        let merger = Merger::new(vec![copy, second]);
        let (v, a, o) = paths();

        let report = merger.merge(&v, &a, &o).await.unwrap();
        assert_eq!(report.strategy, "reencode");
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }
}
