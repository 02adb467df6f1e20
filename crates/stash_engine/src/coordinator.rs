use std::sync::Arc;
use std::time::{Duration, Instant};

use stash_core::{ListingType, ProgressEvent, SessionState};
use stash_logging::{stash_error, stash_info, stash_warn};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::extractor::SubmissionExtractor;
use crate::scanner::{PageQueue, PageScanner, ScanError};
use crate::worker::{DownloadWorker, WorkerOutcome};

/// Submissions downloaded in parallel.
pub const POOL_WIDTH: usize = 4;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub user: String,
    pub listing: ListingType,
}

impl SessionRequest {
    pub fn new(user: impl Into<String>, listing: ListingType) -> Self {
        Self {
            user: user.into(),
            listing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionReport {
    /// Terminal state reached.
    pub state: SessionState,
    /// Pages fully processed.
    pub pages: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl SessionReport {
    fn tally(&mut self, outcome: &WorkerOutcome) {
        match outcome {
            WorkerOutcome::Downloaded { .. } => self.downloaded += 1,
            WorkerOutcome::Skipped { .. } | WorkerOutcome::NoDownloadControl => self.skipped += 1,
            WorkerOutcome::Failed { .. } => self.failed += 1,
            WorkerOutcome::Cancelled => {}
        }
    }
}

/// Runs one download session: scan, then drain the pages one at a time
/// through a fixed-width pool of workers.
pub struct DownloadCoordinator {
    scanner: PageScanner,
    extractor: SubmissionExtractor,
    worker: Arc<DownloadWorker>,
    width: usize,
}

impl DownloadCoordinator {
    pub fn new(scanner: PageScanner, worker: DownloadWorker) -> Self {
        Self {
            scanner,
            extractor: SubmissionExtractor::new(),
            worker: Arc::new(worker),
            width: POOL_WIDTH,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub async fn run(
        &self,
        request: &SessionRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> SessionReport {
        let started = Instant::now();
        let mut report = SessionReport::default();

        let mut queue = match self.discover(request, cancel).await {
            Ok(queue) => queue,
            Err(err) => {
                let event = match err {
                    ScanError::InvalidUser(_) => ProgressEvent::InvalidUser,
                    ScanError::Cancelled => ProgressEvent::Cancelled,
                    other => {
                        stash_error!("Download of {} for '{}' aborted: {}", request.listing, request.user, other);
                        ProgressEvent::Failed(other.to_string())
                    }
                };
                return finish(report, event, started, sink);
            }
        };

        sink.emit(ProgressEvent::PagesDiscovered(queue.total_pages()));
        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut page_number = 0;

        while let Some(page) = queue.pop_front() {
            if cancel.is_cancelled() {
                break;
            }
            page_number += 1;
            let submissions = self.extractor.extract(&page);
            stash_info!(
                "Number of submissions on page {}: {}",
                page_number,
                submissions.len()
            );
            sink.emit(ProgressEvent::SubProgressReset);
            sink.emit(ProgressEvent::SubmissionsOnPage(submissions.len()));

            if !self
                .drain_page(submissions, &semaphore, sink, cancel, &mut report)
                .await
            {
                break;
            }
            report.pages = page_number;
            sink.emit(ProgressEvent::PageAdvanced(page_number));
        }

        let event = if cancel.is_cancelled() {
            stash_info!("Download stopped");
            ProgressEvent::Cancelled
        } else {
            ProgressEvent::Done
        };
        finish(report, event, started, sink)
    }

    async fn discover(
        &self,
        request: &SessionRequest,
        cancel: &CancellationToken,
    ) -> Result<PageQueue, ScanError> {
        self.scanner.resolve_user(&request.user, cancel).await?;
        self.scanner
            .scan(&request.user, request.listing, cancel)
            .await
    }

    /// Runs every submission of one page and waits for all of them.
    /// Returns `false` if the page was interrupted by cancellation.
    async fn drain_page(
        &self,
        submissions: Vec<String>,
        semaphore: &Arc<Semaphore>,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
        report: &mut SessionReport,
    ) -> bool {
        let mut tasks = JoinSet::new();
        for url in submissions {
            if cancel.is_cancelled() {
                break;
            }
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return WorkerOutcome::Cancelled,
                    },
                };
                if cancel.is_cancelled() {
                    return WorkerOutcome::Cancelled;
                }
                worker.process(&url, &cancel).await
            });
        }

        let mut completed = 0;
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                joined = tasks.join_next() => joined,
            };
            match joined {
                None => return !cancel.is_cancelled(),
                Some(Ok(outcome)) => report.tally(&outcome),
                Some(Err(err)) => {
                    stash_error!("Download task ended abnormally: {}", err);
                    report.failed += 1;
                }
            }
            completed += 1;
            sink.emit(ProgressEvent::SubmissionAdvanced(completed));
        }

        // Cancelled: interrupt in-flight workers and wait until all have stopped.
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(outcome) = joined {
                report.tally(&outcome);
            }
        }
        stash_warn!("Page interrupted after {} finished submissions", completed);
        false
    }
}

fn finish(
    mut report: SessionReport,
    event: ProgressEvent,
    started: Instant,
    sink: &dyn ProgressSink,
) -> SessionReport {
    report.state = match event {
        ProgressEvent::Done => SessionState::Completed,
        ProgressEvent::InvalidUser => SessionState::InvalidUser,
        ProgressEvent::Cancelled => SessionState::Cancelled,
        _ => SessionState::Failed,
    };
    report.elapsed = started.elapsed();
    stash_info!(
        "Total time: {:.3}s ({} downloaded, {} skipped, {} failed)",
        report.elapsed.as_secs_f64(),
        report.downloaded,
        report.skipped,
        report.failed
    );
    sink.emit(event);
    report
}
