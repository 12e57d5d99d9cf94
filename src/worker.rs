use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, error::TryRecvError, unbounded_channel},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    client::StreamClient,
    downloader::spawn_download,
    error::DownloadError,
    merger::Merger,
    model::{DownloadRequest, DownloadResult, WorkerEvent},
};

struct ActiveDownload {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    events: UnboundedReceiver<WorkerEvent>,
}

/// Owns the single download slot the UI talks to.
///
/// Only one download runs at a time; [`start`](Self::start) refuses while
/// one is outstanding. Must not be driven from inside the runtime itself,
/// since [`stop`](Self::stop) blocks.
pub struct DownloadController {
    runtime: Handle,
    client: Arc<dyn StreamClient>,
    merger: Arc<Merger>,
    active: Option<ActiveDownload>,
}

impl DownloadController {
    pub fn new(runtime: Handle, client: Arc<dyn StreamClient>, merger: Arc<Merger>) -> Self {
        Self {
            runtime,
            client,
            merger,
            active: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self, request: DownloadRequest) -> Result<(), DownloadError> {
        if self.is_busy() {
            return Err(DownloadError::Busy);
        }
        info!(url = %request.url, format = ?request.format, dest = %request.destination.display(), "starting download");

        let (tx, events) = unbounded_channel();
        let cancel = CancellationToken::new();
        let task = spawn_download(
            &self.runtime,
            request,
            Arc::clone(&self.client),
            Arc::clone(&self.merger),
            tx,
            cancel.clone(),
        );
        self.active = Some(ActiveDownload { cancel, task, events });
        Ok(())
    }

    /// Drains whatever the worker has sent so far without blocking.
    ///
    /// A `Finished` event frees the slot. A worker that died without one
    /// (panic) yields a synthetic failure so the caller still sees exactly
    /// one result.
    pub fn poll(&mut self) -> Vec<WorkerEvent> {
        let mut out = Vec::new();
        let Some(active) = self.active.as_mut() else {
            return out;
        };

        let done = loop {
            match active.events.try_recv() {
                Ok(event) => {
                    let finished = matches!(event, WorkerEvent::Finished(_));
                    out.push(event);
                    if finished {
                        break true;
                    }
                }
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => {
                    error!("download worker exited without a result");
                    let err = DownloadError::Unknown("download worker stopped unexpectedly".to_string());
                    out.push(WorkerEvent::Finished(DownloadResult::failed(&err)));
                    break true;
                }
            }
        };

        if done {
            self.active = None;
        }
        out
    }

    /// Asks the worker to stop and waits for it to wind down.
    ///
    /// In-flight network and process calls are not interrupted; this returns
    /// once the current step has finished and the worker has noticed.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        debug!("stopping active download");
        active.cancel.cancel();
        if let Err(e) = self.runtime.block_on(active.task) {
            error!(error = %e, "download worker panicked");
        }
    }
}

impl Drop for DownloadController {
    fn drop(&mut self) {
        self.stop();
    }
}
