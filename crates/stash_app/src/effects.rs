use std::sync::Arc;

use stash_core::{Effect, Msg, ProgressEvent};
use stash_engine::{DownloadCoordinator, DownloadHandle, SessionReport, SessionRequest};
use stash_logging::{stash_info, stash_warn};

/// Executes core effects against the download engine.
pub struct EffectRunner {
    coordinator: Arc<DownloadCoordinator>,
    handle: Option<DownloadHandle>,
}

impl EffectRunner {
    pub fn new(coordinator: Arc<DownloadCoordinator>) -> Self {
        Self {
            coordinator,
            handle: None,
        }
    }

    /// Runs the effects and returns the messages they produce.
    pub fn apply(&mut self, effects: Vec<Effect>) -> Vec<Msg> {
        let mut msgs = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartDownload { user, listing } => {
                    if self.handle.is_some() {
                        stash_warn!("Download already running; ignoring request for '{}'", user);
                        continue;
                    }
                    stash_info!("Starting download of {} for '{}'", listing, user);
                    let request = SessionRequest::new(user, listing);
                    self.handle = Some(DownloadHandle::spawn(
                        Arc::clone(&self.coordinator),
                        request,
                    ));
                    msgs.push(Msg::ScanStarted);
                }
                Effect::CancelDownload => {
                    if let Some(handle) = &self.handle {
                        stash_info!("Stopping download");
                        handle.cancel();
                    }
                }
            }
        }
        msgs
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Next engine event; `None` when nothing runs or the session ended.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        match self.handle.as_mut() {
            Some(handle) => handle.next_event().await,
            None => None,
        }
    }

    pub async fn finish(&mut self) -> Option<SessionReport> {
        match self.handle.take() {
            Some(handle) => Some(handle.finish().await),
            None => None,
        }
    }
}
