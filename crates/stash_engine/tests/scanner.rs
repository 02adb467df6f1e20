use std::sync::Arc;

use pretty_assertions::assert_eq;
use stash_core::ListingType;
use stash_engine::{FetchSettings, PageScanner, ReqwestFetcher, RetryPolicy, ScanError, SiteProfile};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{body}</body></html>"),
        "text/html; charset=utf-8",
    )
}

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

fn scanner(server: &MockServer) -> PageScanner {
    stash_logging::initialize_for_tests();
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).expect("client builds");
    PageScanner::new(
        Arc::new(fetcher),
        SiteProfile::new(server.uri()),
        RetryPolicy::default(),
    )
}

#[tokio::test]
async fn gallery_stops_at_no_submissions_page() {
    let server = MockServer::start().await;
    for n in 1..=3 {
        serve(
            &server,
            &format!("/gallery/bob/{n}/"),
            &format!(r#"<a href="/view/{n}/">art {n}</a>"#),
        )
        .await;
    }
    serve(&server, "/gallery/bob/4/", "<p>There are no submissions to list</p>").await;

    let queue = scanner(&server)
        .scan("bob", ListingType::Gallery, &CancellationToken::new())
        .await
        .expect("scan ok");

    assert_eq!(queue.total_pages(), 3);
    let urls: Vec<_> = queue.iter().map(|page| page.url.clone()).collect();
    assert_eq!(
        urls,
        (1..=3)
            .map(|n| format!("{}/gallery/bob/{n}/", server.uri()))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn empty_scraps_listing_has_no_pages() {
    let server = MockServer::start().await;
    serve(&server, "/scraps/bob/1/", "<p>There are no submissions to list</p>").await;

    let queue = scanner(&server)
        .scan("bob", ListingType::Scraps, &CancellationToken::new())
        .await
        .expect("scan ok");

    assert_eq!(queue.total_pages(), 0);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn favorites_follow_next_links() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/favorites/bob/",
        r#"<a href="/view/1/">one</a><a href="/favorites/bob/900/next">Next</a>"#,
    )
    .await;
    serve(
        &server,
        "/favorites/bob/900/next",
        r#"<a href="/view/2/">two</a><a href="/favorites/bob/800/next">Next</a>"#,
    )
    .await;
    serve(&server, "/favorites/bob/800/next", r#"<a href="/view/3/">three</a>"#).await;

    let mut queue = scanner(&server)
        .scan("bob", ListingType::Favorites, &CancellationToken::new())
        .await
        .expect("scan ok");

    assert_eq!(queue.total_pages(), 3);
    let last = std::iter::from_fn(|| queue.pop_front()).last().unwrap();
    assert_eq!(last.url, format!("{}/favorites/bob/800/next", server.uri()));
}

#[tokio::test]
async fn favorites_stop_on_link_back_to_visited_page() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/favorites/bob/",
        r#"<a href="/favorites/bob/900/next">Next</a>"#,
    )
    .await;
    serve(
        &server,
        "/favorites/bob/900/next",
        r#"<a href="/favorites/bob/900/next">Next</a>"#,
    )
    .await;

    let queue = scanner(&server)
        .scan("bob", ListingType::Favorites, &CancellationToken::new())
        .await
        .expect("scan ok");

    assert_eq!(queue.total_pages(), 2);
}

#[tokio::test]
async fn unknown_user_is_reported() {
    let server = MockServer::start().await;
    serve(&server, "/user/ghost/", "<p>This user cannot be found.</p>").await;

    let err = scanner(&server)
        .resolve_user("ghost", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::InvalidUser(user) if user == "ghost"));
}

#[tokio::test]
async fn known_user_resolves() {
    let server = MockServer::start().await;
    serve(&server, "/user/bob/", "<p>Userpage of bob</p>").await;

    scanner(&server)
        .resolve_user("bob", &CancellationToken::new())
        .await
        .expect("bob exists");
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gallery/bob/1/"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    serve(&server, "/gallery/bob/1/", r#"<a href="/view/1/">one</a>"#).await;
    serve(&server, "/gallery/bob/2/", "<p>There are no submissions to list</p>").await;

    let queue = scanner(&server)
        .scan("bob", ListingType::Gallery, &CancellationToken::new())
        .await
        .expect("second attempt succeeds");

    assert_eq!(queue.total_pages(), 1);
}

#[tokio::test]
async fn exhausted_retries_abort_the_scan() {
    let server = MockServer::start().await;
    serve(&server, "/gallery/bob/1/", r#"<a href="/view/1/">one</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/gallery/bob/2/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = scanner(&server)
        .scan("bob", ListingType::Gallery, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ScanError::Fetch { url, source } => {
            assert_eq!(url, format!("{}/gallery/bob/2/", server.uri()));
            assert_eq!(source.kind, stash_engine::FailureKind::HttpStatus(500));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_scan_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<p>anything</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = scanner(&server)
        .scan("bob", ListingType::Gallery, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Cancelled));
}
