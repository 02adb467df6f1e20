use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use stash_engine::{
    ArtworkClassifier, Claim, DownloadWorker, FetchSettings, ReqwestFetcher, RetryPolicy,
    SiteProfile, StashIndex, WorkerOutcome, MANIFEST_FILE,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    server: MockServer,
    root: TempDir,
    stash: Arc<StashIndex>,
}

impl Fixture {
    async fn new(stored: &[&str]) -> Self {
        stash_logging::initialize_for_tests();
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("download")).unwrap();
        Self {
            server: MockServer::start().await,
            root,
            stash: Arc::new(StashIndex::from_names(stored.iter().copied())),
        }
    }

    fn worker(&self) -> DownloadWorker {
        let fetcher = ReqwestFetcher::new(FetchSettings::default()).expect("client builds");
        DownloadWorker::new(
            Arc::new(fetcher),
            SiteProfile::new(self.server.uri()),
            Arc::clone(&self.stash),
            self.root.path().join("download"),
            RetryPolicy::default(),
        )
    }

    fn detail_url(&self, id: u32) -> String {
        format!("{}/view/{id}/", self.server.uri())
    }

    async fn detail_page(&self, id: u32, asset_path: &str) {
        let body = format!(
            r#"<html><body>
                <a class="button section-button" href="/fav/{id}/">+Fav</a>
                <a class="button section-button" href="{asset_path}">Download</a>
            </body></html>"#
        );
        Mock::given(method("GET"))
            .and(path(format!("/view/{id}/")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&self.server)
            .await;
    }

    async fn asset(&self, asset_path: &str, body: &[u8], mime: &str, expected: u64) {
        Mock::given(method("GET"))
            .and(path(asset_path))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), mime))
            .expect(expected)
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn downloads_binary_asset_into_download_folder() {
    let fx = Fixture::new(&[]).await;
    fx.detail_page(1, "/art/bob/1234567890.bob_sky.png").await;
    let body: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    fx.asset("/art/bob/1234567890.bob_sky.png", &body, "image/png", 1).await;

    let outcome = fx.worker().process(&fx.detail_url(1), &CancellationToken::new()).await;

    let WorkerOutcome::Downloaded { filename, bytes, .. } = outcome else {
        panic!("expected a download, got {outcome:?}");
    };
    assert_eq!(filename, "1234567890.bob_sky.png");
    assert_eq!(bytes, body.len() as u64);
    let saved = fx.root.path().join("download").join(&filename);
    assert_eq!(fs::read(saved).unwrap(), body);
    assert!(fx.stash.contains(&filename));
}

#[tokio::test]
async fn filename_keeps_spaces_and_matches_stash_scan() {
    let fx = Fixture::new(&[]).await;
    fx.detail_page(10, "/art/bob/1234567890.bob_my pic é.png").await;
    fx.asset("/art/bob/1234567890.bob_my%20pic%20%C3%A9.png", b"png", "image/png", 1)
        .await;

    let outcome = fx.worker().process(&fx.detail_url(10), &CancellationToken::new()).await;

    let WorkerOutcome::Downloaded { filename, .. } = outcome else {
        panic!("expected a download, got {outcome:?}");
    };
    assert_eq!(filename, "1234567890.bob_my pic é.png");
    assert!(fx.root.path().join("download").join(&filename).is_file());
    // A later session indexes the stash from disk and must recognise the file.
    let rescanned = Arc::new(StashIndex::scan(fx.root.path()));
    assert!(rescanned.contains(&filename));
    let next_session = DownloadWorker::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default()).expect("client builds")),
        SiteProfile::new(fx.server.uri()),
        rescanned,
        fx.root.path().join("download"),
        RetryPolicy::default(),
    );
    assert_eq!(
        next_session.process(&fx.detail_url(10), &CancellationToken::new()).await,
        WorkerOutcome::Skipped { filename }
    );
}

#[tokio::test]
async fn text_asset_is_written_as_text() {
    let fx = Fixture::new(&[]).await;
    fx.detail_page(2, "/art/bob/1234567890.bob_story.txt").await;
    fx.asset(
        "/art/bob/1234567890.bob_story.txt",
        "Once upon a time".as_bytes(),
        "text/plain; charset=utf-8",
        1,
    )
    .await;

    let outcome = fx.worker().process(&fx.detail_url(2), &CancellationToken::new()).await;

    assert!(matches!(outcome, WorkerOutcome::Downloaded { .. }));
    let saved = fx.root.path().join("download").join("1234567890.bob_story.txt");
    assert_eq!(fs::read_to_string(saved).unwrap(), "Once upon a time");
}

#[tokio::test]
async fn stashed_file_is_skipped_without_fetching_asset() {
    let fx = Fixture::new(&["1234567890.bob_sky.png"]).await;
    fx.detail_page(3, "/art/bob/1234567890.bob_sky.png").await;
    fx.asset("/art/bob/1234567890.bob_sky.png", b"png", "image/png", 0).await;

    let outcome = fx.worker().process(&fx.detail_url(3), &CancellationToken::new()).await;

    assert_eq!(
        outcome,
        WorkerOutcome::Skipped {
            filename: "1234567890.bob_sky.png".to_string()
        }
    );
    assert_eq!(fs::read_dir(fx.root.path().join("download")).unwrap().count(), 0);
}

#[tokio::test]
async fn page_without_download_control_is_a_no_op() {
    let fx = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .and(path("/view/4/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a class="button" href="/art/x.png">Download</a><p>Mature content</p>"#,
            "text/html",
        ))
        .mount(&fx.server)
        .await;

    let outcome = fx.worker().process(&fx.detail_url(4), &CancellationToken::new()).await;

    assert_eq!(outcome, WorkerOutcome::NoDownloadControl);
    assert!(fx.stash.is_empty());
}

#[tokio::test]
async fn detail_page_failure_is_retried_then_abandoned() {
    let fx = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .and(path("/view/5/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&fx.server)
        .await;

    let outcome = fx.worker().process(&fx.detail_url(5), &CancellationToken::new()).await;

    assert!(matches!(outcome, WorkerOutcome::Failed { .. }));
}

#[tokio::test]
async fn failed_asset_releases_its_claim() {
    let fx = Fixture::new(&[]).await;
    fx.detail_page(6, "/art/bob/1234567890.bob_gone.png").await;
    Mock::given(method("GET"))
        .and(path("/art/bob/1234567890.bob_gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&fx.server)
        .await;

    let outcome = fx.worker().process(&fx.detail_url(6), &CancellationToken::new()).await;

    assert!(matches!(outcome, WorkerOutcome::Failed { .. }));
    assert!(!fx.stash.contains("1234567890.bob_gone.png"));
    assert!(matches!(fx.stash.claim("1234567890.bob_gone.png"), Claim::Acquired(_)));
    assert_eq!(fs::read_dir(fx.root.path().join("download")).unwrap().count(), 0);
}

#[tokio::test]
async fn filing_moves_download_into_author_folder() {
    let fx = Fixture::new(&[]).await;
    fx.detail_page(7, "/art/bob/1234567890.bob_sky.png").await;
    fx.detail_page(8, "/art/bob/sky.png").await;
    fx.asset("/art/bob/1234567890.bob_sky.png", b"png", "image/png", 1).await;
    fx.asset("/art/bob/sky.png", b"png", "image/png", 1).await;
    let worker = fx.worker().with_filing(
        ArtworkClassifier::new(fx.root.path()).with_stash(Arc::clone(&fx.stash)),
    );
    let cancel = CancellationToken::new();

    worker.process(&fx.detail_url(7), &cancel).await;
    worker.process(&fx.detail_url(8), &cancel).await;

    let root = fx.root.path();
    assert!(root.join("bob").join("1234567890.bob_sky.png").is_file());
    assert!(!root.join("download").join("1234567890.bob_sky.png").exists());
    // Names without the site's id prefix stay where they were downloaded.
    assert!(root.join("download").join("sky.png").is_file());
    assert_eq!(
        fs::read_to_string(root.join(MANIFEST_FILE)).unwrap(),
        "bob:\n\t1. 1234567890.bob_sky.png\n\n"
    );
}

#[tokio::test]
async fn cancelled_worker_does_nothing() {
    let fx = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = fx.worker().process(&fx.detail_url(9), &cancel).await;

    assert_eq!(outcome, WorkerOutcome::Cancelled);
}
