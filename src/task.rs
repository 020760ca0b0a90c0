use std::{path::PathBuf, sync::Arc};

use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, unbounded_channel},
        oneshot::{self, error::TryRecvError},
    },
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    error::DownloadError,
    host::VideoHost,
    model::{DownloadOutcome, RequestKind, VideoRequest},
    progress::DownloadEvent,
    workflow,
};

/// How a background download ended
#[derive(Debug)]
pub enum TaskOutcome {
    Finished(Result<DownloadOutcome, DownloadError>),
    /// Cancelled, or the task died before reporting
    Aborted,
}

/// One download running on the runtime, owned by the UI.
pub struct DownloadTask {
    kind: RequestKind,
    handle: JoinHandle<()>,
    outcome_rx: oneshot::Receiver<Result<DownloadOutcome, DownloadError>>,
    events_rx: UnboundedReceiver<DownloadEvent>,
}

impl DownloadTask {
    pub fn spawn<H>(
        runtime: &Handle,
        host: Arc<H>,
        request: VideoRequest,
        output_dir: PathBuf,
    ) -> Self
    where
        H: VideoHost + ?Sized + 'static,
    {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (events_tx, events_rx) = unbounded_channel();
        let kind = request.kind;

        let handle = runtime.spawn(async move {
            debug!("Starting {:?} download of {}", request.kind, request.url);
            let result = workflow::dispatch(host.as_ref(), &request, &output_dir, &events_tx).await;
            if let Err(e) = &result {
                warn!("Download of {} failed: {e}", request.url);
            }
            let _ = outcome_tx.send(result);
        });

        Self {
            kind,
            handle,
            outcome_rx,
            events_rx,
        }
    }

    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Next pending side-channel event, without waiting.
    pub fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events_rx.try_recv().ok()
    }

    /// `None` while the download is still running.
    pub fn poll_outcome(&mut self) -> Option<TaskOutcome> {
        match self.outcome_rx.try_recv() {
            Ok(result) => Some(TaskOutcome::Finished(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(TaskOutcome::Aborted),
        }
    }

    pub fn cancel(&self) {
        debug!("Cancelling {:?} download", self.kind);
        self.handle.abort();
    }

    #[cfg(test)]
    pub async fn join(self) -> TaskOutcome {
        match self.outcome_rx.await {
            Ok(result) => TaskOutcome::Finished(result),
            Err(_) => TaskOutcome::Aborted,
        }
    }
}
