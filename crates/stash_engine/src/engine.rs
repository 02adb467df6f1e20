use std::sync::Arc;

use stash_core::ProgressEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{ChannelProgressSink, DownloadCoordinator, SessionReport, SessionRequest};

/// A download session running on the current tokio runtime.
pub struct DownloadHandle {
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    task: JoinHandle<SessionReport>,
}

impl DownloadHandle {
    pub fn spawn(coordinator: Arc<DownloadCoordinator>, request: SessionRequest) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let sink = ChannelProgressSink::new(event_tx);
            coordinator.run(&request, &sink, &token).await
        });

        Self {
            events,
            cancel,
            task,
        }
    }

    /// Asks the session to stop; progress keeps flowing until the terminal event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next progress event; `None` once the session has ended and all events were read.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<ProgressEvent> {
        self.events.try_recv().ok()
    }

    /// Waits for the session to end and returns its report.
    pub async fn finish(self) -> SessionReport {
        match self.task.await {
            Ok(report) => report,
            Err(err) => {
                stash_logging::stash_error!("Download session task failed: {}", err);
                SessionReport {
                    state: stash_core::SessionState::Failed,
                    ..SessionReport::default()
                }
            }
        }
    }
}
