//! Download core for the yt-grab desktop app: resolve a YouTube URL, pick the
//! best streams, fetch them and mux them into an MP4 (or keep the audio as
//! MP3), reporting progress to the UI thread over a channel.

// Port to the stream-resolution backend
pub mod client;
// Download pipeline (resolve, select, fetch, merge)
pub mod downloader;
// Error types for every layer
pub mod error;
// tracing setup
pub mod logging;
// ffmpeg merge strategies
pub mod merger;
// Requests, results and worker events
pub mod model;
// UI notice texts
pub mod notice;
// Progress bands and the worker-side reporter
pub mod progress;
// Filename cleanup
pub mod sanitize;
// Self-deleting temp files
pub mod scratch;
// Stream ranking
pub mod selection;
// Persisted user preferences
pub mod settings;
// Bundled/PATH executable lookup
pub mod tools;
// Single-slot download controller
pub mod worker;
// yt-dlp backed stream client
pub mod ytdlp;
