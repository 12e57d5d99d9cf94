mod common;

use std::{
    sync::{Arc, atomic::Ordering},
    thread,
    time::{Duration, Instant},
};

use common::*;
use tokio::runtime::Runtime;
use yt_grab::{
    error::DownloadError,
    model::{DownloadRequest, OutputFormat, WorkerEvent},
    worker::DownloadController,
};

fn mp3_request(dir: &std::path::Path) -> DownloadRequest {
    DownloadRequest {
        url: "https://youtu.be/abc".to_string(),
        destination: dir.to_path_buf(),
        format: OutputFormat::Mp3,
        bypass: None,
    }
}

/// Polls until a `Finished` arrives, returning every event seen.
fn wait_for_finish(controller: &mut DownloadController) -> Vec<WorkerEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        events.extend(controller.poll());
        if events.iter().any(|e| matches!(e, WorkerEvent::Finished(_))) {
            return events;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("download never finished: {events:?}");
}

#[test]
fn second_start_is_refused_while_busy() {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut client = FakeClient::with_info(info("Song", vec![audio("140", 128.0)]));
    client.fetch_delay = Some(Duration::from_millis(100));
    let (merger, _) = merger(merge_ok);
    let mut controller = DownloadController::new(rt.handle().clone(), Arc::new(client), Arc::new(merger));

    controller.start(mp3_request(dir.path())).unwrap();
    assert!(controller.is_busy());
    assert!(matches!(controller.start(mp3_request(dir.path())), Err(DownloadError::Busy)));

    let events = wait_for_finish(&mut controller);
    assert!(!controller.is_busy());
    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Finished(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 1);
    assert!(finished[0].success, "{}", finished[0].message);

    // the slot is free again
    controller.start(mp3_request(dir.path())).unwrap();
    wait_for_finish(&mut controller);
}

#[test]
fn stop_blocks_until_worker_is_done() {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut client = FakeClient::with_info(info("Song", vec![audio("140", 128.0)]));
    client.fetch_delay = Some(Duration::from_millis(200));
    let client = Arc::new(client);
    let (merger, _) = merger(merge_ok);
    let mut controller = DownloadController::new(rt.handle().clone(), client.clone(), Arc::new(merger));

    controller.start(mp3_request(dir.path())).unwrap();
    // let the worker reach the fetch
    let deadline = Instant::now() + Duration::from_secs(5);
    while client.fetched_ids().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    controller.stop();

    assert!(!controller.is_busy());
    // the in-flight fetch was allowed to finish, then the worker bailed out
    assert_eq!(client.completed_fetches.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("Song.mp3").exists());
    assert!(leftover_temp_files(dir.path()).is_empty());
    assert!(controller.poll().is_empty());
}

#[test]
fn failures_arrive_as_finished_events() {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::with_info(info("Podcast", vec![audio("140", 128.0)]));
    let (merger, _) = merger(merge_ok);
    let mut controller = DownloadController::new(rt.handle().clone(), Arc::new(client), Arc::new(merger));

    let mut request = mp3_request(dir.path());
    request.format = OutputFormat::Mp4;
    controller.start(request).unwrap();

    let events = wait_for_finish(&mut controller);
    match events.last() {
        Some(WorkerEvent::Finished(result)) => {
            assert!(!result.success);
            assert!(result.message.contains("no suitable video/audio stream"));
        }
        other => panic!("unexpected last event {other:?}"),
    }
}

#[test]
fn worker_panic_yields_exactly_one_failure() {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut client = FakeClient::with_info(info("Song", vec![audio("140", 128.0)]));
    client.fetch_panics = true;
    let (merger, _) = merger(merge_ok);
    let mut controller = DownloadController::new(rt.handle().clone(), Arc::new(client), Arc::new(merger));

    controller.start(mp3_request(dir.path())).unwrap();
    let mut events = wait_for_finish(&mut controller);
    thread::sleep(Duration::from_millis(50));
    events.extend(controller.poll());

    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Finished(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 1, "{events:?}");
    assert!(!finished[0].success);
    assert!(finished[0].message.contains("stopped unexpectedly"), "{}", finished[0].message);
    assert!(!controller.is_busy());
    assert!(leftover_temp_files(dir.path()).is_empty());
}
