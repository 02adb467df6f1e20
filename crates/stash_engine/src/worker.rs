use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use stash_logging::{stash_debug, stash_error, stash_info, stash_warn};
use tokio_util::sync::CancellationToken;

use crate::classify::{ArtworkClassifier, AuthorPolicy, ClassifyOptions, SourceFile};
use crate::fetch::{with_retries, Fetcher, RetryPolicy};
use crate::filename::asset_filename;
use crate::html::resolve_url;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::site::SiteProfile;
use crate::stash::{Claim, StashIndex};
use crate::{AssetBody, FailureKind, FetchError};

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Downloaded {
        filename: String,
        bytes: u64,
        elapsed: Duration,
    },
    /// The file is already in the stash (or being written by another worker).
    Skipped { filename: String },
    /// The detail page has no download control; nothing to do.
    NoDownloadControl,
    Failed { reason: String },
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("error writing to file: {0}")]
    Persist(#[from] PersistError),
}

impl DownloadError {
    fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Fetch(err) if err.kind == FailureKind::Cancelled)
    }
}

/// Downloads single submissions into the stash's download folder.
///
/// Every failure stays inside [`DownloadWorker::process`]; it is logged and
/// reported as an outcome so sibling workers are unaffected.
pub struct DownloadWorker {
    fetcher: Arc<dyn Fetcher>,
    site: SiteProfile,
    stash: Arc<StashIndex>,
    download_dir: PathBuf,
    writer: AtomicFileWriter,
    retry: RetryPolicy,
    filing: Option<ArtworkClassifier>,
}

impl DownloadWorker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        site: SiteProfile,
        stash: Arc<StashIndex>,
        download_dir: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            site,
            stash,
            writer: AtomicFileWriter::new(download_dir.clone()),
            download_dir,
            retry,
            filing: None,
        }
    }

    /// Moves each finished download into its author folder.
    pub fn with_filing(mut self, classifier: ArtworkClassifier) -> Self {
        self.filing = Some(classifier);
        self
    }

    pub async fn process(&self, detail_url: &str, cancel: &CancellationToken) -> WorkerOutcome {
        let started = Instant::now();
        let fetcher = self.fetcher.as_ref();

        let page = match with_retries(self.retry, cancel, detail_url, || {
            fetcher.fetch_page(detail_url)
        })
        .await
        {
            Ok(page) => page,
            Err(err) if err.kind == FailureKind::Cancelled => return WorkerOutcome::Cancelled,
            Err(err) => {
                stash_error!("Error loading submission page {}: {}", detail_url, err);
                return WorkerOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let Some(control) = page
            .anchors
            .iter()
            .find(|anchor| self.site.is_download_control(anchor))
        else {
            stash_warn!("No download link on {}", detail_url);
            return WorkerOutcome::NoDownloadControl;
        };

        let Some((asset_url, filename)) = resolve_url(&control.href, &page.url)
            .zip(asset_filename(&control.href))
        else {
            stash_error!("Unusable download link '{}' on {}", control.href, detail_url);
            return WorkerOutcome::Failed {
                reason: format!("unusable download link '{}'", control.href),
            };
        };

        let claim = match self.stash.claim(&filename) {
            Claim::Acquired(claim) => claim,
            Claim::Stored => {
                stash_info!("Skipped: {}", filename);
                return WorkerOutcome::Skipped { filename };
            }
            Claim::InFlight => {
                stash_info!("Skipped: {} (already being downloaded)", filename);
                return WorkerOutcome::Skipped { filename };
            }
        };

        let bytes = match self.download(asset_url.as_str(), &filename, cancel).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_cancelled() => return WorkerOutcome::Cancelled,
            Err(err) => {
                stash_error!("Failed to download {} from {}: {}", filename, asset_url, err);
                return WorkerOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };
        claim.commit();

        let elapsed = started.elapsed();
        stash_info!("Downloaded: {} ({} bytes)", filename, bytes);
        stash_info!("Download time: {:.3}s", elapsed.as_secs_f64());
        self.file_download(&filename);

        WorkerOutcome::Downloaded {
            filename,
            bytes,
            elapsed,
        }
    }

    async fn download(
        &self,
        url: &str,
        filename: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let fetcher = self.fetcher.as_ref();
        let body = with_retries(self.retry, cancel, url, || fetcher.fetch_asset(url)).await?;

        match body {
            AssetBody::Text(text) => {
                self.writer.write(filename, &text)?;
                Ok(text.len() as u64)
            }
            AssetBody::Binary(mut stream) => {
                let mut staged = self.writer.stage()?;
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::cancelled().into()),
                        next = stream.next() => next,
                    };
                    match next {
                        Some(chunk) => staged.write_chunk(&chunk?)?,
                        None => break,
                    }
                }
                let bytes = staged.bytes_written();
                staged.persist(filename)?;
                Ok(bytes)
            }
        }
    }

    fn file_download(&self, filename: &str) {
        let Some(classifier) = &self.filing else {
            return;
        };
        if AuthorPolicy::Import.author_of(filename).is_none() {
            stash_debug!("Incorrect format for file: {}; left in download folder", filename);
            return;
        }
        let file = SourceFile {
            filename: filename.to_string(),
            path: self.download_dir.join(filename),
        };
        if let Err(err) = classifier.classify(vec![file], ClassifyOptions::import()) {
            stash_error!("Error filing {}: {}", filename, err);
        }
    }
}
