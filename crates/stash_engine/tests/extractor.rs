use pretty_assertions::assert_eq;
use stash_engine::{parse_page, SubmissionExtractor};

#[test]
fn extracts_view_links_in_page_order() {
    let page = parse_page(
        "https://site.test/gallery/bob/1/",
        r#"<html><body>
            <a href="/view/30/"><img src="t30.jpg"></a>
            <a href="/user/bob/">bob</a>
            <a href="/view/10/">Ten</a>
            <a href="https://site.test/view/20/">Twenty</a>
        </body></html>"#,
    );

    let urls = SubmissionExtractor::new().extract(&page);

    assert_eq!(
        urls,
        vec![
            "https://site.test/view/30/",
            "https://site.test/view/10/",
            "https://site.test/view/20/",
        ]
    );
}

#[test]
fn thumbnail_and_title_links_count_once() {
    let page = parse_page(
        "https://site.test/gallery/bob/1/",
        r#"<a href="/view/7/"><img src="t.jpg"></a><a href="/view/7/">Title</a>"#,
    );

    assert_eq!(
        SubmissionExtractor::new().extract(&page),
        vec!["https://site.test/view/7/"]
    );
}

#[test]
fn page_without_submissions_yields_nothing() {
    let page = parse_page(
        "https://site.test/gallery/bob/1/",
        r#"<p>nothing here</p><a href="/journal/5/">journal</a>"#,
    );

    assert!(SubmissionExtractor::new().extract(&page).is_empty());
}
