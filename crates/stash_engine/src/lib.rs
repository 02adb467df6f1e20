//! Artstash engine: crawling, downloading and filing artwork.
mod classify;
mod coordinator;
mod decode;
mod engine;
mod extractor;
mod fetch;
mod filename;
mod html;
mod persist;
mod scanner;
mod site;
mod stash;
mod types;
mod worker;

pub use classify::{
    collect_inputs, ArtworkClassifier, AuthorPolicy, ClassifyError, ClassifyOptions,
    ClassifyReport, Gallery, ManifestMode, Placement, PlacementOutcome, SourceFile,
    MANIFEST_FILE, UNSORTED, VALID_EXTENSIONS,
};
pub use coordinator::{
    ChannelProgressSink, DownloadCoordinator, ProgressSink, SessionReport, SessionRequest,
    POOL_WIDTH,
};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use engine::DownloadHandle;
pub use extractor::SubmissionExtractor;
pub use fetch::{with_retries, FetchSettings, Fetcher, ReqwestFetcher, RetryPolicy, MAX_ATTEMPTS};
pub use filename::{asset_filename, sanitize_filename};
pub use html::{parse_page, resolve_url, PageParser};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError, StagedFile, ASSET_CHUNK_BYTES};
pub use scanner::{PageQueue, PageScanner, ScanError};
pub use site::SiteProfile;
pub use stash::{Claim, Stash, StashClaim, StashError, StashIndex, DOWNLOAD_DIR};
pub use types::{Anchor, AssetBody, FailureKind, FetchError, Page};
pub use worker::{DownloadWorker, WorkerOutcome};
