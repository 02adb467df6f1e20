use std::sync::Arc;

use anyhow::{bail, Context};
use stash_core::{update, AppState, ListingType, Msg};
use stash_engine::{
    ArtworkClassifier, DownloadCoordinator, DownloadWorker, PageScanner, ReqwestFetcher,
    SessionReport, Stash,
};
use stash_logging::stash_info;

use crate::config::StashConfig;
use crate::effects::EffectRunner;
use crate::render::ProgressLine;

/// Wires fetcher, scanner, worker and coordinator for one stash.
pub fn build_coordinator(config: &StashConfig, stash: &Stash) -> anyhow::Result<DownloadCoordinator> {
    let fetcher = Arc::new(
        ReqwestFetcher::new(config.fetch_settings()).context("failed to build HTTP client")?,
    );
    let site = config.site_profile();
    let retry = config.retry_policy();

    let scanner = PageScanner::new(fetcher.clone(), site.clone(), retry);
    let mut worker = DownloadWorker::new(
        fetcher,
        site,
        Arc::clone(stash.index()),
        stash.download_dir().to_path_buf(),
        retry,
    );
    if config.sort_downloads {
        worker = worker.with_filing(
            ArtworkClassifier::new(stash.root()).with_stash(Arc::clone(stash.index())),
        );
    }
    Ok(DownloadCoordinator::new(scanner, worker).with_width(config.workers))
}

/// Drives one download session to its end: engine events and Ctrl-C are
/// folded through `update`, the resulting effects go back to the engine.
pub async fn run_download(
    coordinator: DownloadCoordinator,
    user: String,
    listing: ListingType,
) -> anyhow::Result<SessionReport> {
    let mut runner = EffectRunner::new(Arc::new(coordinator));
    let mut progress = ProgressLine::new();
    let mut state = AppState::new();

    let mut inbox = vec![Msg::DownloadRequested { user, listing }];
    loop {
        for msg in std::mem::take(&mut inbox) {
            let (next, effects) = update(state, msg);
            state = next;
            inbox.extend(runner.apply(effects));
        }
        if state.consume_dirty() {
            progress.render(&state.view());
        }
        if !inbox.is_empty() {
            continue;
        }
        if !runner.is_running() {
            bail!("download request was rejected (empty user name?)");
        }
        if state.session_state().is_terminal() {
            break;
        }

        tokio::select! {
            event = runner.next_event() => match event {
                Some(event) => inbox.push(Msg::Progress(event)),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                stash_info!("Ctrl-C received");
                inbox.push(Msg::CancelRequested);
            }
        }
    }
    progress.close();

    runner
        .finish()
        .await
        .context("download session never started")
}
