use std::cmp::Reverse;

use crate::client::{StreamDescriptor, StreamKind};

/// Resolution we aim for when picking a video stream.
pub const TARGET_RESOLUTION: u32 = 1080;

/// `"1080p"` -> `1080`. The trailing unit letter is dropped.
pub fn parse_resolution(label: &str) -> Option<u32> {
    let label = label.trim();
    let mut chars = label.chars();
    chars.next_back()?;
    chars.as_str().parse().ok()
}

fn resolution_of(stream: &StreamDescriptor) -> u32 {
    stream.resolution.as_deref().and_then(parse_resolution).unwrap_or(0)
}

/// Picks the MP4 video-only stream to merge.
///
/// The smallest resolution at or above [`TARGET_RESOLUTION`] wins; without
/// one, the highest available. Equal resolutions keep the client's order.
/// A stream at the target beats every higher one: `[2160, 1440, 1080]`
/// yields 1080, not 2160.
pub fn pick_video_stream(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    let mut candidates: Vec<&StreamDescriptor> = streams
        .iter()
        .filter(|s| s.kind == StreamKind::VideoOnly && s.is_adaptive() && s.extension == "mp4")
        .collect();
    candidates.sort_by_key(|s| Reverse(resolution_of(s)));

    candidates
        .iter()
        .copied()
        .filter(|s| resolution_of(s) >= TARGET_RESOLUTION)
        .min_by_key(|s| resolution_of(s))
        .or_else(|| candidates.first().copied())
}

/// Picks the audio-only stream with the highest bitrate.
pub fn pick_audio_stream(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    streams
        .iter()
        .filter(|s| s.kind == StreamKind::AudioOnly)
        // reversed comparison; min_by keeps the first of equal bitrates
        .min_by(|a, b| {
            let a = a.bitrate_kbps.unwrap_or(0.0);
            let b = b.bitrate_kbps.unwrap_or(0.0);
            b.total_cmp(&a)
        })
}
